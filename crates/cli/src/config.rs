use std::path::{Path, PathBuf};

use roas_core::DEFAULT_THRESHOLD;
use roas_sheets::{LarkSettings, Platform, DEFAULT_READ_RANGE};
use serde::Deserialize;
use thiserror::Error;

pub const SECRET_ENV: &str = "ROAS_SYNC_APP_SECRET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing config value: {0}")]
    Missing(&'static str),
    #[error("Matching threshold must be in (0, 1], got {0}")]
    InvalidThreshold(f64),
    #[error("No config directory available; pass --config")]
    NoConfigDir,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub sheet: SheetConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetConfig {
    #[serde(default)]
    pub platform: Platform,
    pub base_url: Option<String>,
    #[serde(default)]
    pub app_id: String,
    pub app_secret: Option<String>,
    #[serde(default)]
    pub spreadsheet_token: String,
    #[serde(default)]
    pub sheet_id: String,
    #[serde(default = "default_read_range")]
    pub read_range: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

fn default_read_range() -> String {
    DEFAULT_READ_RANGE.to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// `<config_dir>/roas-sync/config.toml`.
pub fn default_path() -> Result<PathBuf, ConfigError> {
    directories::ProjectDirs::from("com", "roas-sync", "roas-sync")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

impl Config {
    /// Load from TOML, or JSON when the file ends in `.json`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config: Config = if is_json {
            serde_json::from_str(&text)?
        } else {
            toml::from_str(&text)?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let sheet = &self.sheet;
        if sheet.app_id.trim().is_empty() {
            return Err(ConfigError::Missing("sheet.app_id"));
        }
        if sheet.spreadsheet_token.trim().is_empty() {
            return Err(ConfigError::Missing("sheet.spreadsheet_token"));
        }
        if sheet.sheet_id.trim().is_empty() {
            return Err(ConfigError::Missing("sheet.sheet_id"));
        }
        validate_threshold(self.matching.threshold)?;
        Ok(())
    }
}

/// A matching threshold must lie in (0, 1].
pub fn validate_threshold(t: f64) -> Result<f64, ConfigError> {
    if t > 0.0 && t <= 1.0 {
        Ok(t)
    } else {
        Err(ConfigError::InvalidThreshold(t))
    }
}

impl SheetConfig {
    /// Client settings; a non-empty `env_secret` wins over the file value.
    pub fn settings(&self, env_secret: Option<String>) -> Result<LarkSettings, ConfigError> {
        let app_secret = env_secret
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.app_secret.clone().filter(|s| !s.trim().is_empty()))
            .ok_or(ConfigError::Missing("sheet.app_secret"))?;
        Ok(LarkSettings {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| self.platform.base_url().to_string()),
            app_id: self.app_id.clone(),
            app_secret,
            spreadsheet_token: self.spreadsheet_token.clone(),
            sheet_id: self.sheet_id.clone(),
            max_retries: self.max_retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(name: &str, body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(body.as_bytes())
            .unwrap();
        (dir, path)
    }

    const TOML: &str = r#"
[sheet]
platform = "feishu"
app_id = "cli_a1"
app_secret = "from-file"
spreadsheet_token = "shtX"
sheet_id = "0b12"

[matching]
threshold = 0.8
"#;

    #[test]
    fn loads_toml_with_defaults() {
        let (_dir, path) = write_config("config.toml", TOML);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sheet.platform, Platform::Feishu);
        assert_eq!(config.sheet.read_range, "A1:Z100");
        assert_eq!(config.sheet.max_retries, 3);
        assert_eq!(config.matching.threshold, 0.8);

        let settings = config.sheet.settings(None).unwrap();
        assert_eq!(settings.base_url, "https://open.feishu.cn/open-apis");
        assert_eq!(settings.app_secret, "from-file");
    }

    #[test]
    fn loads_json_by_extension() {
        let json = r#"{"sheet": {"app_id": "cli_a1", "app_secret": "s",
            "spreadsheet_token": "shtX", "sheet_id": "0b12",
            "base_url": "http://localhost:9000/open-apis"}}"#;
        let (_dir, path) = write_config("config.json", json);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sheet.platform, Platform::Lark);
        assert_eq!(config.matching.threshold, DEFAULT_THRESHOLD);
        assert_eq!(
            config.sheet.settings(None).unwrap().base_url,
            "http://localhost:9000/open-apis"
        );
    }

    #[test]
    fn env_secret_overrides_file() {
        let (_dir, path) = write_config("config.toml", TOML);
        let config = Config::load(&path).unwrap();
        let settings = config.sheet.settings(Some("from-env".into())).unwrap();
        assert_eq!(settings.app_secret, "from-env");
        let settings = config.sheet.settings(Some("  ".into())).unwrap();
        assert_eq!(settings.app_secret, "from-file");
    }

    #[test]
    fn missing_secret_is_reported() {
        let body = TOML.replace("app_secret = \"from-file\"\n", "");
        let (_dir, path) = write_config("config.toml", &body);
        let config = Config::load(&path).unwrap();
        assert!(matches!(
            config.sheet.settings(None),
            Err(ConfigError::Missing("sheet.app_secret"))
        ));
    }

    #[test]
    fn missing_required_keys_fail_at_load() {
        let body = TOML.replace("sheet_id = \"0b12\"\n", "");
        let (_dir, path) = write_config("config.toml", &body);
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Missing("sheet.sheet_id"))
        ));
    }

    #[test]
    fn threshold_out_of_range() {
        let body = TOML.replace("threshold = 0.8", "threshold = 1.5");
        let (_dir, path) = write_config("config.toml", &body);
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(&dir.path().join("nope.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn malformed_toml() {
        let (_dir, path) = write_config("config.toml", "[sheet\napp_id = ");
        assert!(matches!(Config::load(&path), Err(ConfigError::Toml(_))));
    }
}
