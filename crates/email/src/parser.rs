use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use roas_core::Week;
use rust_decimal::Decimal;
use tracing::debug;

use crate::html;
use crate::report::{ParseError, ParsedCampaign, ParsedReport, Totals};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_week_short, r"(?i)\bWK\s*\d+\b");
re!(re_week_long, r"(?i)\bWeek\s*\d+\b");
re!(re_headline_roas, r"(?is)\bWeek\s+\d+.*?\bdrove\s+a\s+(\d+(?:\.\d+)?)x\s+ROAS\b");
re!(re_any_roas, r"(?i)(\d+(?:\.\d+)?)x\s+ROAS\b");
re!(re_dollar, r"^\(?\$\s*[\d,]+(?:\.\d+)?\)?$");
re!(re_roas_cell, r"^\d+\.\d+$");
re!(re_total_roas_cell, r"^\d+(?:\.\d+)?$");

const SECTION_START: &str = "Campaign Name";
const SECTION_END: &str = "TOTAL";
const ADJUSTED_TOTAL: &str = "Total (minus credit + lag revenue)";
const CAMPAIGN_MARKER: &str = "EVRGN";
const AD_GROUP_MARKERS: [&str; 2] = ["US_NAT", "CA_NAT"];

// ── Public API ────────────────────────────────────────────────────────────────

pub struct ReportParser;

impl ReportParser {
    /// Parse a weekly performance email (plain text or HTML body).
    pub fn parse(body: &str) -> Result<ParsedReport, ParseError> {
        let text = if html::looks_like_html(body) {
            html::html_to_text(body)
        } else {
            body.to_string()
        };

        let week = Self::extract_week(&text).ok_or(ParseError::MissingWeek)?;
        let overall_roas = Self::extract_overall_roas(&text);
        let campaigns = Self::extract_campaigns(&text);
        if campaigns.is_empty() {
            return Err(ParseError::NoCampaigns);
        }

        Ok(ParsedReport {
            week,
            overall_roas,
            campaigns,
            total: Self::extract_totals(&text, |l| l == SECTION_END),
            adjusted_total: Self::extract_totals(&text, |l| l.contains(ADJUSTED_TOTAL)),
        })
    }

    pub fn parse_file(path: &Path) -> Result<ParsedReport, ParseError> {
        let body = std::fs::read_to_string(path)?;
        Self::parse(&body)
    }

    // ── Week ─────────────────────────────────────────────────────────────────

    fn extract_week(text: &str) -> Option<Week> {
        [re_week_short(), re_week_long()]
            .iter()
            .find_map(|re| re.find(text))
            .and_then(|m| m.as_str().parse::<Week>().ok())
    }

    // ── Overall ROAS ─────────────────────────────────────────────────────────

    fn extract_overall_roas(text: &str) -> Option<f64> {
        // Prefer the headline sentence over any other "x ROAS" mention.
        [re_headline_roas(), re_any_roas()]
            .iter()
            .find_map(|re| re.captures(text))
            .and_then(|c| c.get(1)?.as_str().parse::<f64>().ok())
    }

    // ── Campaign table ───────────────────────────────────────────────────────

    /// Walks the table one cell per line: a name line containing "EVRGN",
    /// an optional ad group, spend, optional revenue, then a decimal ROAS
    /// that closes the block. Incomplete blocks are dropped.
    fn extract_campaigns(text: &str) -> Vec<ParsedCampaign> {
        let mut campaigns = Vec::new();
        let mut in_section = false;
        let mut pending: Option<PendingCampaign> = None;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if !in_section {
                in_section = line.contains(SECTION_START);
                continue;
            }
            if line.contains(SECTION_END) {
                break;
            }

            let Some(p) = pending.as_mut() else {
                if line.contains(CAMPAIGN_MARKER) {
                    pending = Some(PendingCampaign::new(line));
                } else {
                    debug!("Skipping line outside a campaign block: '{line}'");
                }
                continue;
            };

            if p.ad_group.is_none()
                && p.spend.is_none()
                && AD_GROUP_MARKERS.iter().any(|m| line.contains(m))
            {
                p.ad_group = Some(line.to_string());
            } else if re_dollar().is_match(line) {
                match parse_amount(line) {
                    Ok(amount) if p.spend.is_none() => p.spend = Some(amount),
                    Ok(amount) if p.revenue.is_none() => p.revenue = Some(amount),
                    Ok(_) => debug!("Extra amount '{line}' in block '{}'", p.raw_name),
                    Err(e) => debug!("{e} in block '{}'", p.raw_name),
                }
            } else if re_roas_cell().is_match(line) {
                let roas = line.parse::<f64>().ok();
                if let Some(done) = pending.take().and_then(|p| p.finish(roas)) {
                    campaigns.push(done);
                }
            } else if line.contains(CAMPAIGN_MARKER) {
                debug!("Dropping incomplete campaign block '{}'", p.raw_name);
                pending = Some(PendingCampaign::new(line));
            }
        }

        if let Some(p) = pending {
            debug!("Dropping unterminated campaign block '{}'", p.raw_name);
        }
        campaigns
    }

    // ── Totals ───────────────────────────────────────────────────────────────

    /// The three lines after the marker line are spend, revenue and ROAS.
    fn extract_totals(text: &str, is_marker: impl Fn(&str) -> bool) -> Option<Totals> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let idx = lines.iter().position(|l| is_marker(l))?;
        let cells = lines.get(idx + 1..idx + 4)?;

        let money = |s: &str| {
            re_dollar()
                .is_match(s)
                .then(|| parse_amount(s).ok())
                .flatten()
        };
        let totals = Totals {
            spend: money(cells[0]),
            revenue: money(cells[1]),
            roas: re_total_roas_cell()
                .is_match(cells[2])
                .then(|| cells[2].parse::<f64>().ok())
                .flatten(),
        };
        (totals != Totals::default()).then_some(totals)
    }
}

struct PendingCampaign {
    raw_name: String,
    ad_group: Option<String>,
    spend: Option<Decimal>,
    revenue: Option<Decimal>,
}

impl PendingCampaign {
    fn new(name: &str) -> Self {
        Self {
            raw_name: name.to_string(),
            ad_group: None,
            spend: None,
            revenue: None,
        }
    }

    fn finish(self, roas: Option<f64>) -> Option<ParsedCampaign> {
        match (self.spend, roas) {
            (Some(spend), Some(roas)) => Some(ParsedCampaign {
                raw_name: self.raw_name,
                ad_group: self.ad_group,
                spend,
                revenue: self.revenue,
                roas,
            }),
            _ => {
                debug!("Dropping campaign block '{}' without spend", self.raw_name);
                None
            }
        }
    }
}

/// "$1,234.56" → 1234.56; accounting parentheses mean negative.
pub(crate) fn parse_amount(s: &str) -> Result<Decimal, ParseError> {
    let s = s.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let cleaned = s.replace(['$', ',', ' '], "");
    let amount =
        Decimal::from_str(&cleaned).map_err(|_| ParseError::InvalidAmount(s.to_string()))?;
    Ok(if negative { -amount } else { amount })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK_37: &str = "\
Subject: Adobe ROAS Recap - WK 37

Hi team,
Week 37 drove a 3.24x ROAS across evergreen campaigns, up from 2.90x ROAS last week.

Campaign Name
Ad Group
Spend
Revenue
ROAS
EVRGN-TOF-PROS_DM (US)
US_NAT_BROAD
$12,500
$38,750
3.10
EVRGN-TOF-SMART_PROS_DM (US)
US_NAT_SMART
$8,000
$28,000
3.50
EVRGN-RTG_DM (CA)
CA_NAT_RTG
$2,000
$9,000
4.50
EVRGN-CNS-SMART_PROS_DM (CA)
CA_NAT_CNS
$1,500
$3,000
2.00
TOTAL
$24,000
$78,750
3.28
Total (minus credit + lag revenue)
$23,100
$74,844
3.24
";

    #[test]
    fn parses_full_report() {
        let report = ReportParser::parse(WEEK_37).unwrap();
        assert_eq!(report.week, Week(37));
        assert_eq!(report.overall_roas, Some(3.24));
        assert_eq!(report.campaigns.len(), 4);

        let first = &report.campaigns[0];
        assert_eq!(first.raw_name, "EVRGN-TOF-PROS_DM (US)");
        assert_eq!(first.ad_group.as_deref(), Some("US_NAT_BROAD"));
        assert_eq!(first.spend, Decimal::from(12_500));
        assert_eq!(first.revenue, Some(Decimal::from(38_750)));
        assert_eq!(first.roas, 3.10);

        assert_eq!(report.campaigns[3].raw_name, "EVRGN-CNS-SMART_PROS_DM (CA)");
        assert_eq!(report.campaigns[3].roas, 2.00);
    }

    #[test]
    fn parses_totals() {
        let report = ReportParser::parse(WEEK_37).unwrap();
        let total = report.total.unwrap();
        assert_eq!(total.spend, Some(Decimal::from(24_000)));
        assert_eq!(total.revenue, Some(Decimal::from(78_750)));
        assert_eq!(total.roas, Some(3.28));
        let adjusted = report.adjusted_total.unwrap();
        assert_eq!(adjusted.roas, Some(3.24));
    }

    #[test]
    fn records_feed_reconciliation() {
        let records = ReportParser::parse(WEEK_37).unwrap().records();
        assert_eq!(records.len(), 4);
        assert!(records.iter().all(|r| r.week == Week(37)));
        assert_eq!(records[1].metric_value, 3.50);
    }

    #[test]
    fn headline_roas_wins_over_other_mentions() {
        let text = "Last week was 2.90x ROAS. Week 12 drove a 4.01x ROAS.";
        assert_eq!(ReportParser::extract_overall_roas(text), Some(4.01));
        assert_eq!(ReportParser::extract_overall_roas("flat 2x ROAS"), Some(2.0));
        assert_eq!(ReportParser::extract_overall_roas("no figure"), None);
    }

    #[test]
    fn week_falls_back_to_long_form() {
        assert_eq!(ReportParser::extract_week("wk 5 recap"), Some(Week(5)));
        assert_eq!(ReportParser::extract_week("Week 41 results"), Some(Week(41)));
        assert_eq!(ReportParser::extract_week("weekly recap"), None);
    }

    #[test]
    fn missing_week_is_an_error() {
        let text = WEEK_37.replace("WK 37", "").replace("Week 37", "This week");
        assert!(matches!(ReportParser::parse(&text), Err(ParseError::MissingWeek)));
    }

    #[test]
    fn no_campaign_table_is_an_error() {
        let text = "WK 37\nWeek 37 drove a 3.24x ROAS\nNo table this week.";
        assert!(matches!(ReportParser::parse(text), Err(ParseError::NoCampaigns)));
    }

    #[test]
    fn block_without_spend_is_dropped() {
        let text = "\
WK 3
Campaign Name
EVRGN-RTG_DM (US)
US_NAT_RTG
4.10
EVRGN-TOF_DM (US)
$100
2.25
TOTAL
";
        let report = ReportParser::parse(text).unwrap();
        assert_eq!(report.campaigns.len(), 1);
        assert_eq!(report.campaigns[0].raw_name, "EVRGN-TOF_DM (US)");
        assert_eq!(report.campaigns[0].revenue, None);
    }

    #[test]
    fn new_name_restarts_an_incomplete_block() {
        let text = "\
WK 3
Campaign Name
EVRGN-RTG_DM (US)
$50
EVRGN-TOF_DM (US)
$100
$300
3.00
TOTAL
";
        let report = ReportParser::parse(text).unwrap();
        assert_eq!(report.campaigns.len(), 1);
        assert_eq!(report.campaigns[0].raw_name, "EVRGN-TOF_DM (US)");
        assert_eq!(report.campaigns[0].spend, Decimal::from(100));
    }

    #[test]
    fn totals_skip_blank_lines() {
        let text = "WK 3\n\nCampaign Name\n\nEVRGN-TOF_DM (US)\n\n$100\n\n$300\n\n3.00\n\n\
            TOTAL\n\n$100\n\n$300\n\n3.00\n\n\
            Total (minus credit + lag revenue)\n\n$90\n\n$270\n\n3.00\n";
        let report = ReportParser::parse(text).unwrap();
        assert_eq!(report.campaigns.len(), 1);

        let total = report.total.unwrap();
        assert_eq!(total.spend, Some(Decimal::from(100)));
        assert_eq!(total.revenue, Some(Decimal::from(300)));
        assert_eq!(total.roas, Some(3.0));

        let adjusted = report.adjusted_total.unwrap();
        assert_eq!(adjusted.spend, Some(Decimal::from(90)));
        assert_eq!(adjusted.revenue, Some(Decimal::from(270)));
        assert_eq!(adjusted.roas, Some(3.0));
    }

    #[test]
    fn parses_html_body() {
        let html = "<html><body><p>Adobe ROAS WK 9</p><p>Week 9 drove a 2.75x ROAS</p>\
            <table><tr><th>Campaign Name</th><th>Spend</th><th>Revenue</th><th>ROAS</th></tr>\
            <tr><td>EVRGN-RTG_DM (US)</td><td>$1,000</td><td>$2,750</td><td>2.75</td></tr>\
            <tr><td>TOTAL</td><td>$1,000</td><td>$2,750</td><td>2.75</td></tr></table></body></html>";
        let report = ReportParser::parse(html).unwrap();
        assert_eq!(report.week, Week(9));
        assert_eq!(report.campaigns.len(), 1);
        assert_eq!(report.campaigns[0].roas, 2.75);
        assert_eq!(report.total.unwrap().spend, Some(Decimal::from(1_000)));
    }

    #[test]
    fn parse_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wk37.txt");
        std::fs::write(&path, WEEK_37).unwrap();
        let report = ReportParser::parse_file(&path).unwrap();
        assert_eq!(report.campaigns.len(), 4);
        assert!(matches!(
            ReportParser::parse_file(&dir.path().join("missing.txt")),
            Err(ParseError::Io(_))
        ));
    }

    #[test]
    fn parse_amount_formats() {
        assert_eq!(parse_amount("$1,234.56").unwrap(), Decimal::new(123_456, 2));
        assert_eq!(parse_amount("($75.25)").unwrap(), Decimal::new(-7_525, 2));
        assert_eq!(parse_amount("$ 500").unwrap(), Decimal::from(500));
        assert!(parse_amount("$").is_err());
    }
}
