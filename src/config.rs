//! Runtime settings
//!
//! Resolved in layers: built-in defaults, then an optional JSON settings
//! file, then environment variables (a `.env` file is loaded by the binaries).

use crate::error::CalcError;
use crate::Result;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PRICE_BASE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceApiSettings {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for PriceApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PRICE_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub price_api: PriceApiSettings,
    pub api_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            price_api: PriceApiSettings::default(),
            api_port: DEFAULT_API_PORT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(rename = "CryptoApi", default)]
    crypto_api: Option<CryptoApiSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CryptoApiSection {
    coin_gecko_base_url: Option<String>,
    request_timeout_seconds: Option<u64>,
}

impl Settings {
    /// Load from `MYCALC_SETTINGS` (or `appsettings.json` if present) and the process environment.
    pub fn load() -> Result<Self> {
        let path = env::var("MYCALC_SETTINGS").unwrap_or_else(|_| DEFAULT_SETTINGS_FILE.to_string());

        let contents = if Path::new(&path).exists() {
            Some(std::fs::read_to_string(&path)?)
        } else {
            None
        };

        Self::from_sources(contents.as_deref(), |key| env::var(key).ok())
    }

    /// Resolve settings from raw file contents and an environment lookup.
    pub fn from_sources<F>(file_contents: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(contents) = file_contents {
            let file: SettingsFile = serde_json::from_str(contents)?;
            if let Some(section) = file.crypto_api {
                if let Some(url) = section.coin_gecko_base_url {
                    settings.price_api.base_url = url;
                }
                if let Some(secs) = section.request_timeout_seconds {
                    settings.price_api.request_timeout = Duration::from_secs(secs);
                }
            }
        }

        if let Some(url) = lookup("MYCALC_PRICE_BASE_URL") {
            settings.price_api.base_url = url;
        }

        if let Some(raw) = lookup("MYCALC_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                CalcError::ConfigError(format!("MYCALC_REQUEST_TIMEOUT_SECS is not a number: {}", raw))
            })?;
            settings.price_api.request_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("PORT").or_else(|| lookup("API_PORT")) {
            settings.api_port = raw
                .trim()
                .parse()
                .map_err(|_| CalcError::ConfigError(format!("Invalid port: {}", raw)))?;
        }

        settings.price_api.base_url = settings.price_api.base_url.trim().trim_end_matches('/').to_string();

        if settings.price_api.base_url.is_empty() {
            return Err(CalcError::ConfigError("Price API base URL is empty".to_string()));
        }
        if settings.price_api.request_timeout.is_zero() {
            return Err(CalcError::ConfigError(
                "Request timeout must be at least one second".to_string(),
            ));
        }

        Ok(settings)
    }
}
