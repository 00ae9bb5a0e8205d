use roas_core::{CampaignRecord, Week};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No week number found (expected 'WK <n>' or 'Week <n>')")]
    MissingWeek,
    #[error("No campaign rows found")]
    NoCampaigns,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// One campaign block from the "Campaign Name" table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedCampaign {
    pub raw_name: String,
    pub ad_group: Option<String>,
    pub spend: Decimal,
    pub revenue: Option<Decimal>,
    pub roas: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub spend: Option<Decimal>,
    pub revenue: Option<Decimal>,
    pub roas: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedReport {
    pub week: Week,
    /// Headline figure, e.g. "Week 37 drove a 3.24x ROAS".
    pub overall_roas: Option<f64>,
    pub campaigns: Vec<ParsedCampaign>,
    /// The "TOTAL" row of the campaign table.
    pub total: Option<Totals>,
    /// The "Total (minus credit + lag revenue)" row.
    pub adjusted_total: Option<Totals>,
}

impl ParsedReport {
    /// Campaign ROAS values as reconciliation input. Non-finite values never
    /// reach the matcher.
    pub fn records(&self) -> Vec<CampaignRecord> {
        self.campaigns
            .iter()
            .filter(|c| c.roas.is_finite())
            .map(|c| CampaignRecord::new(c.raw_name.clone(), c.roas, self.week))
            .collect()
    }
}
