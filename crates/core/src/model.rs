use serde::{Deserialize, Serialize};
use std::fmt;

/// Reporting week number as it appears in email subjects ("WK 37") and
/// sheet headers ("Week 37").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Week(pub u32);

impl fmt::Display for Week {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Week {}", self.0)
    }
}

impl std::str::FromStr for Week {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let digits = lower
            .strip_prefix("week")
            .or_else(|| lower.strip_prefix("wk"))
            .unwrap_or(&lower)
            .trim();
        digits
            .parse::<u32>()
            .map(Week)
            .map_err(|_| format!("Invalid week: '{s}'"))
    }
}

/// One campaign line from the performance email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub raw_name: String,
    pub metric_value: f64,
    pub week: Week,
}

impl CampaignRecord {
    pub fn new(raw_name: impl Into<String>, metric_value: f64, week: Week) -> Self {
        Self {
            raw_name: raw_name.into(),
            metric_value,
            week,
        }
    }
}

/// A labelled row of the tracking sheet. `row_index` is 1-based, as in A1 notation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRow {
    pub label: String,
    pub row_index: u32,
}

impl TargetRow {
    pub fn new(label: impl Into<String>, row_index: u32) -> Self {
        Self {
            label: label.into(),
            row_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteInstruction {
    pub row_index: u32,
    pub value: f64,
    /// Sheet label of the target row.
    pub label: String,
    /// Campaign name the value came from.
    pub source_name: String,
}
