use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{CellUpdate, CellValue, SheetClient, SheetError};

const USER_AGENT: &str = concat!("roas-sync/", env!("CARGO_PKG_VERSION"));
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);
/// Refresh the tenant token this long before the server says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);
/// Envelope codes for a tenant token the server no longer accepts.
const INVALID_TOKEN_CODES: [i64; 2] = [99991663, 99991668];

/// Which deployment of the Sheets open API to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// International (larksuite.com).
    #[default]
    Lark,
    /// Mainland China (feishu.cn).
    Feishu,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Lark, Platform::Feishu];

    pub fn base_url(&self) -> &'static str {
        match self {
            Platform::Lark => "https://open.larksuite.com/open-apis",
            Platform::Feishu => "https://open.feishu.cn/open-apis",
        }
    }
}

/// Connection settings for one sheet tab.
#[derive(Debug, Clone)]
pub struct LarkSettings {
    pub base_url: String,
    pub app_id: String,
    pub app_secret: String,
    pub spreadsheet_token: String,
    pub sheet_id: String,
    pub max_retries: u32,
}

/// One tab of the spreadsheet, as listed by the metainfo endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetInfo {
    pub sheet_id: String,
    pub title: String,
}

#[derive(Debug, Clone)]
struct TenantToken {
    value: String,
    refresh_at: Instant,
}

pub struct LarkSheetClient {
    http: reqwest::Client,
    settings: LarkSettings,
    token: Mutex<Option<TenantToken>>,
    backoff: Duration,
}

impl LarkSheetClient {
    pub fn new(settings: LarkSettings) -> Result<Self, SheetError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            settings,
            token: Mutex::new(None),
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Initial delay between retries; doubles on each attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn settings(&self) -> &LarkSettings {
        &self.settings
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn sheet_range(&self, range: &str) -> String {
        format!("{}!{}", self.settings.sheet_id, range)
    }

    /// Tenant access token, fetched on first use and cached until shortly
    /// before it expires.
    async fn access_token(&self) -> Result<String, SheetError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        debug!("Requesting tenant access token for app {}", self.settings.app_id);
        let url = self.url("auth/v3/tenant_access_token/internal");
        let payload = json!({
            "app_id": self.settings.app_id,
            "app_secret": self.settings.app_secret,
        });
        let body = self.send(|http| http.post(&url).json(&payload)).await?;

        let value = body["tenant_access_token"]
            .as_str()
            .ok_or_else(|| SheetError::Decode("missing tenant_access_token".into()))?
            .to_string();
        let ttl = Duration::from_secs(body["expire"].as_u64().unwrap_or(0));
        *cached = Some(TenantToken {
            value: value.clone(),
            refresh_at: Instant::now() + ttl.saturating_sub(TOKEN_SLACK),
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Request a fresh tenant token, bypassing the cache.
    pub async fn verify_credentials(&self) -> Result<(), SheetError> {
        self.invalidate_token().await;
        self.access_token().await.map(|_| ())
    }

    /// Tabs of the configured spreadsheet.
    pub async fn sheet_info(&self) -> Result<Vec<SheetInfo>, SheetError> {
        let url = self.url(&format!(
            "sheets/v2/spreadsheets/{}/metainfo",
            self.settings.spreadsheet_token
        ));
        let body = self.authorized(|http| http.get(&url)).await?;
        let sheets = body["data"]["sheets"]
            .as_array()
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|s| {
                        Some(SheetInfo {
                            sheet_id: s["sheetId"].as_str()?.to_string(),
                            title: s["title"].as_str().unwrap_or_default().to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(sheets)
    }

    /// Send with retry and exponential backoff on 429 / 5xx / transport
    /// errors, then unwrap the `{code, msg, data}` envelope.
    async fn send(
        &self,
        build_request: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    ) -> Result<Value, SheetError> {
        let max_retries = self.settings.max_retries;
        let mut backoff = self.backoff;
        let mut attempt = 0;

        loop {
            match build_request(&self.http).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt < max_retries {
                        attempt += 1;
                        warn!(
                            "Sheet API returned HTTP {}; retry {}/{} in {:?}",
                            status.as_u16(),
                            attempt,
                            max_retries,
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                        continue;
                    }
                    if !status.is_success() {
                        let body = resp.text().await.unwrap_or_default();
                        // Error statuses often still carry the JSON envelope.
                        if let Ok(envelope) = serde_json::from_str::<Value>(&body) {
                            if envelope["code"].as_i64().is_some_and(|c| c != 0) {
                                return check_envelope(envelope);
                            }
                        }
                        return Err(SheetError::Status {
                            status: status.as_u16(),
                            body: body.chars().take(200).collect(),
                        });
                    }
                    let body: Value = resp.json().await?;
                    return check_envelope(body);
                }
                Err(e) if attempt < max_retries && (e.is_connect() || e.is_timeout()) => {
                    attempt += 1;
                    warn!("Sheet API request failed ({e}); retry {attempt}/{max_retries} in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn authorized(
        &self,
        build_request: impl Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    ) -> Result<Value, SheetError> {
        let token = self.access_token().await?;
        match self.send(|http| build_request(http).bearer_auth(&token)).await {
            Err(SheetError::Api { code, .. }) if INVALID_TOKEN_CODES.contains(&code) => {
                warn!("Tenant token rejected (code {code}); requesting a new one");
                self.invalidate_token().await;
                let token = self.access_token().await?;
                self.send(|http| build_request(http).bearer_auth(&token)).await
            }
            other => other,
        }
    }
}

fn check_envelope(body: Value) -> Result<Value, SheetError> {
    match body["code"].as_i64() {
        Some(0) => Ok(body),
        Some(code) => Err(SheetError::Api {
            code,
            msg: body["msg"].as_str().unwrap_or_default().to_string(),
        }),
        None => Err(SheetError::Decode(format!("response without code: {body}"))),
    }
}

#[async_trait]
impl SheetClient for LarkSheetClient {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<CellValue>>, SheetError> {
        let url = self.url(&format!(
            "sheets/v2/spreadsheets/{}/values/{}",
            self.settings.spreadsheet_token,
            self.sheet_range(range)
        ));
        let body = self.authorized(|http| http.get(&url)).await?;

        let rows = body["data"]["valueRange"]["values"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(CellValue::from_json).collect())
                            .unwrap_or_default()
                    })
                    .collect::<Vec<Vec<CellValue>>>()
            })
            .unwrap_or_default();
        debug!("Read {} rows from {}", rows.len(), range);
        Ok(rows)
    }

    async fn write_range(&self, range: &str, values: Vec<Vec<CellValue>>) -> Result<(), SheetError> {
        let url = self.url(&format!(
            "sheets/v2/spreadsheets/{}/values",
            self.settings.spreadsheet_token
        ));
        let payload = json!({
            "valueRange": { "range": self.sheet_range(range), "values": values }
        });
        self.authorized(|http| http.put(&url).json(&payload)).await?;
        debug!("Wrote range {}", range);
        Ok(())
    }

    async fn insert_column(&self, index: u32) -> Result<(), SheetError> {
        let url = self.url(&format!(
            "sheets/v3/spreadsheets/{}/sheets/{}/insert_dimension",
            self.settings.spreadsheet_token, self.settings.sheet_id
        ));
        let payload = json!({
            "dimension_range": {
                "major_dimension": "COLUMNS",
                "start_index": index,
                "end_index": index + 1,
            }
        });
        self.authorized(|http| http.post(&url).json(&payload)).await?;
        info!("Inserted column at index {}", index);
        Ok(())
    }

    async fn batch_write(&self, updates: &[CellUpdate]) -> Result<(), SheetError> {
        if updates.is_empty() {
            return Ok(());
        }
        let url = self.url(&format!(
            "sheets/v2/spreadsheets/{}/values_batch_update",
            self.settings.spreadsheet_token
        ));
        let value_ranges: Vec<Value> = updates
            .iter()
            .map(|u| json!({ "range": self.sheet_range(&u.range), "values": u.values }))
            .collect();
        let payload = json!({ "valueRanges": value_ranges });
        self.authorized(|http| http.put(&url).json(&payload)).await?;
        info!("Batch wrote {} ranges", updates.len());
        Ok(())
    }
}
