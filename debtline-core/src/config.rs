//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "app": { "defaultUser": "me", "requestTimeoutSecs": 30 },
//!   "plaid": { "clientId": "...", "secret": "...", "environment": "sandbox" },
//!   "method": { "apiKey": "...", "environment": "dev" }
//! }
//! ```
//! Credentials can also come from the environment (`PLAID_CLIENT_ID`,
//! `PLAID_SECRET`, `METHOD_API_KEY`, ...), which wins over the file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Default bound on every outbound provider request
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    plaid: PlaidSettings,
    #[serde(default)]
    method: MethodSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_timeout_secs: Option<u64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Plaid credentials
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaidSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// sandbox | development | production
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Overrides the environment URL (mock servers in tests)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Method Financial credentials
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// dev | sandbox | production
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Debtline configuration (resolved view of settings + environment)
#[derive(Debug, Clone)]
pub struct Config {
    pub default_user: Option<String>,
    pub request_timeout_secs: u64,
    pub plaid: PlaidSettings,
    pub method: MethodSettings,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_user: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            plaid: PlaidSettings::default(),
            method: MethodSettings::default(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load config from the data directory, then apply environment overrides
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let mut config = Self::from_settings(raw);
        config.apply_env();
        Ok(config)
    }

    fn from_settings(raw: SettingsFile) -> Self {
        Self {
            default_user: raw.app.default_user.clone(),
            request_timeout_secs: raw
                .app
                .request_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            plaid: raw.plaid.clone(),
            method: raw.method.clone(),
            _raw_settings: raw,
        }
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_var("PLAID_CLIENT_ID") {
            self.plaid.client_id = Some(v);
        }
        if let Some(v) = env_var("PLAID_SECRET") {
            self.plaid.secret = Some(v);
        }
        if let Some(v) = env_var("PLAID_ENV") {
            self.plaid.environment = Some(v);
        }
        if let Some(v) = env_var("PLAID_BASE_URL") {
            self.plaid.base_url = Some(v);
        }
        if let Some(v) = env_var("METHOD_API_KEY") {
            self.method.api_key = Some(v);
        }
        if let Some(v) = env_var("METHOD_ENV") {
            self.method.environment = Some(v);
        }
        if let Some(v) = env_var("METHOD_BASE_URL") {
            self.method.base_url = Some(v);
        }
        if let Some(secs) = env_var("DEBTLINE_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok()) {
            if secs > 0 {
                self.request_timeout_secs = secs;
            }
        }
        if let Some(user) = env_var("DEBTLINE_USER") {
            self.default_user = Some(user);
        }
    }

    /// Save config to the data directory.
    /// Preserves settings this crate doesn't manage.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        settings.app.default_user = self.default_user.clone();
        settings.app.request_timeout_secs = Some(self.request_timeout_secs);
        settings.plaid = self.plaid.clone();
        settings.method = self.method.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}
