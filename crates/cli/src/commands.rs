use std::path::Path;

use anyhow::{bail, Context, Result};
use roas_core::{Matcher, Reconciler, TargetRow};
use roas_email::ReportParser;
use roas_sheets::{check_access, detect_platforms, known_platforms, LarkSheetClient, SheetSync};
use tracing::{info, warn};

use crate::config::{Config, SECRET_ENV};

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Non-empty lines of a label file; the row index is the 1-based line number.
pub fn load_labels(path: &Path) -> Result<Vec<TargetRow>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading labels from {}", path.display()))?;
    let rows: Vec<TargetRow> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| TargetRow::new(line.trim(), i as u32 + 1))
        .collect();
    if rows.is_empty() {
        bail!("no labels in {}", path.display());
    }
    Ok(rows)
}

pub fn parse(email: &Path) -> Result<()> {
    let report = ReportParser::parse_file(email)
        .with_context(|| format!("parsing {}", email.display()))?;
    info!("Parsed {} campaigns for {}", report.campaigns.len(), report.week);
    print_json(&report)
}

pub fn match_labels(email: &Path, labels: &Path, threshold: f64) -> Result<()> {
    let report = ReportParser::parse_file(email)
        .with_context(|| format!("parsing {}", email.display()))?;
    let rows = load_labels(labels)?;
    let reconciliation = Reconciler::new(Matcher::new(threshold)).reconcile(&report.records(), &rows);
    info!(
        "Matched {}/{} campaigns against {} labels",
        reconciliation.matched_count(),
        reconciliation.results.len(),
        rows.len()
    );
    print_json(&reconciliation)
}

pub async fn push(email: &Path, config: &Config, dry_run: bool) -> Result<()> {
    let report = ReportParser::parse_file(email)
        .with_context(|| format!("parsing {}", email.display()))?;
    let settings = config.sheet.settings(std::env::var(SECRET_ENV).ok())?;
    let client = LarkSheetClient::new(settings)?;
    let sync = SheetSync::new(client, Reconciler::new(Matcher::new(config.matching.threshold)))
        .with_read_range(config.sheet.read_range.clone());

    let outcome = sync.run(&report, dry_run).await?;
    info!(
        "{}: {} cells {} in column {}, {} unmatched",
        outcome.week,
        if dry_run { outcome.updates.len() } else { outcome.cells_written },
        if dry_run { "planned" } else { "written" },
        outcome.column,
        outcome.unmatched.len()
    );
    print_json(&outcome)
}

/// Read-only access check; fails when any step does.
pub async fn check(config: &Config) -> Result<()> {
    let settings = config.sheet.settings(std::env::var(SECRET_ENV).ok())?;
    let platforms = detect_platforms(&settings, &known_platforms()).await;
    if let Some(accepted) = platforms.iter().find(|p| p.ok) {
        if accepted.platform != config.sheet.platform && config.sheet.base_url.is_none() {
            warn!(
                "Credentials work on {:?} but the config selects {:?}",
                accepted.platform, config.sheet.platform
            );
        }
    }

    let client = LarkSheetClient::new(settings)?;
    let report = check_access(&client, &config.sheet.read_range, platforms).await;
    print_json(&report)?;
    match report.failed_step() {
        Some(step) => bail!("check failed at {}: {}", step.name, step.detail),
        None => {
            info!("Sheet access OK");
            Ok(())
        }
    }
}
