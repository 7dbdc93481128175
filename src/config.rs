//! User settings and API endpoints, passed explicitly to whoever needs them.

use crate::errors::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

/// Which currencies and tickers the summary reports on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSettings {
    pub user_currencies: Vec<String>,
    pub user_stocks: Vec<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            user_currencies: vec!["USD".into(), "EUR".into()],
            user_stocks: ["AAPL", "AMZN", "GOOGL", "MSFT", "TSLA"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl UserSettings {
    /// Read a `user_settings.json`.
    ///
    /// A missing file yields the defaults; keys absent from the file are
    /// filled from the defaults too. A file that exists but is not valid
    /// JSON is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{} not found, using default settings", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))
    }
}

/// Currency and stock provider endpoints.
///
/// URLs are prefixes: the key (currency) or ticker (stocks) is appended
/// verbatim, so `STOCKS_API_URL` is expected to end with `?symbol=` or
/// similar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiConfig {
    pub currency_api_url: Option<String>,
    pub currency_api_key: Option<String>,
    pub stocks_api_url: Option<String>,
    pub stocks_api_key: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        Self {
            currency_api_url: get("CURRENCY_API_URL"),
            currency_api_key: get("CURRENCY_API_KEY"),
            stocks_api_url: get("STOCKS_API_URL"),
            stocks_api_key: get("STOCKS_API_KEY"),
        }
    }
}
