use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Sheet API error {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

/// A single cell as read from or written to the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Trimmed display text; numbers render without a trailing ".0".
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => n.to_string(),
        }
    }

    /// Convert a raw API cell. Rich-text cells arrive as an array of
    /// segments and are flattened to their text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => CellValue::Empty,
            Value::Number(n) => n.as_f64().map_or(CellValue::Empty, CellValue::Number),
            Value::String(s) => CellValue::Text(s.clone()),
            Value::Bool(b) => CellValue::Text(b.to_string()),
            Value::Array(segments) => CellValue::Text(
                segments
                    .iter()
                    .filter_map(|s| s.get("text").and_then(Value::as_str))
                    .collect(),
            ),
            Value::Object(obj) => obj
                .get("text")
                .and_then(Value::as_str)
                .map_or(CellValue::Empty, CellValue::text),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

/// Values for one A1 range in a batch write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellUpdate {
    pub range: String,
    pub values: Vec<Vec<CellValue>>,
}

impl CellUpdate {
    pub fn single(range: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            range: range.into(),
            values: vec![vec![value.into()]],
        }
    }
}

/// Abstraction over a remote spreadsheet. Ranges are A1 notation relative to
/// the sheet the client was configured for ("A1:Z100", "C7").
#[async_trait]
pub trait SheetClient: Send + Sync {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<CellValue>>, SheetError>;

    async fn write_range(&self, range: &str, values: Vec<Vec<CellValue>>) -> Result<(), SheetError>;

    /// Insert one empty column before the 0-based `index`.
    async fn insert_column(&self, index: u32) -> Result<(), SheetError>;

    async fn batch_write(&self, updates: &[CellUpdate]) -> Result<(), SheetError>;
}
