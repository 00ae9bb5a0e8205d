//! Read-only connectivity check: which platform accepts the app
//! credentials, whether the spreadsheet and tab are visible, and whether the
//! configured range reads back as a usable layout.

use serde::Serialize;
use tracing::{info, warn};

use crate::client::SheetClient;
use crate::lark::{LarkSettings, LarkSheetClient, Platform};
use crate::layout::SheetLayout;

#[derive(Debug, Clone, Serialize)]
pub struct PlatformStatus {
    pub platform: Platform,
    pub base_url: String,
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckStep {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub platforms: Vec<PlatformStatus>,
    pub steps: Vec<CheckStep>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.ok)
    }

    pub fn failed_step(&self) -> Option<&CheckStep> {
        self.steps.iter().find(|s| !s.ok)
    }
}

/// The public deployments, for [`detect_platforms`].
pub fn known_platforms() -> Vec<(Platform, String)> {
    Platform::ALL
        .iter()
        .map(|p| (*p, p.base_url().to_string()))
        .collect()
}

/// Request a tenant token from each candidate base URL with the same app
/// credentials. Failures are reported, never retried.
pub async fn detect_platforms(
    settings: &LarkSettings,
    candidates: &[(Platform, String)],
) -> Vec<PlatformStatus> {
    let mut out = Vec::with_capacity(candidates.len());
    for (platform, base_url) in candidates {
        let settings = LarkSettings {
            base_url: base_url.clone(),
            max_retries: 0,
            ..settings.clone()
        };
        let result = match LarkSheetClient::new(settings) {
            Ok(client) => client.verify_credentials().await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => info!("{platform:?} accepts the credentials at {base_url}"),
            Err(e) => warn!("{platform:?} rejected the credentials: {e}"),
        }
        out.push(PlatformStatus {
            platform: *platform,
            base_url: base_url.clone(),
            ok: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        });
    }
    out
}

/// Token, then spreadsheet metadata, then a read of `read_range`. Stops at
/// the first failing step.
pub async fn check_access(
    client: &LarkSheetClient,
    read_range: &str,
    platforms: Vec<PlatformStatus>,
) -> CheckReport {
    let mut report = CheckReport {
        platforms,
        steps: Vec::new(),
    };
    let settings = client.settings();

    let token = client.verify_credentials().await;
    let ok = token.is_ok();
    report.steps.push(CheckStep {
        name: "token",
        ok,
        detail: match token {
            Ok(()) => format!("tenant token issued for app {}", settings.app_id),
            Err(e) => e.to_string(),
        },
    });
    if !ok {
        return report;
    }

    let step = match client.sheet_info().await {
        Ok(tabs) => match tabs.iter().find(|t| t.sheet_id == settings.sheet_id) {
            Some(tab) => CheckStep {
                name: "metainfo",
                ok: true,
                detail: format!("tab {} is '{}' ({} tabs)", tab.sheet_id, tab.title, tabs.len()),
            },
            None => CheckStep {
                name: "metainfo",
                ok: false,
                detail: format!(
                    "tab {} not found; available: {}",
                    settings.sheet_id,
                    tabs.iter()
                        .map(|t| format!("{} '{}'", t.sheet_id, t.title))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
        },
        Err(e) => CheckStep {
            name: "metainfo",
            ok: false,
            detail: e.to_string(),
        },
    };
    let ok = step.ok;
    report.steps.push(step);
    if !ok {
        return report;
    }

    let step = match client.read_range(read_range).await {
        Ok(values) => {
            let layout = SheetLayout::from_values(&values);
            CheckStep {
                name: "read",
                ok: true,
                detail: format!(
                    "{} rows, {} week columns, {} labelled rows",
                    values.len(),
                    layout.week_columns.len(),
                    layout.targets.len()
                ),
            }
        }
        Err(e) => CheckStep {
            name: "read",
            ok: false,
            detail: e.to_string(),
        },
    };
    report.steps.push(step);
    report
}
