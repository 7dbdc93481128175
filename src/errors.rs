//! Tiny alias so we can return `Result<T>` everywhere, plus the failure
//! classes of date parsing and the market lookups.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Why a date cell was not accepted.
#[derive(Debug, Error)]
pub enum DateError {
    #[error("{0:?} does not follow the expected layout")]
    Layout(String),

    #[error(transparent)]
    Parse(#[from] chrono::ParseError),
}

/// Why a currency or stock lookup produced no data.
///
/// Only used for logging: `MarketClient` absorbs every variant and
/// degrades to an empty (or zero-priced) answer.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for MarketError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MarketError::Timeout
        } else if e.is_connect() {
            MarketError::Connect(e.to_string())
        } else if e.is_decode() {
            MarketError::Decode(e.to_string())
        } else {
            MarketError::Other(e.to_string())
        }
    }
}
