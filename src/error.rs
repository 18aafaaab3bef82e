//! Error types.
//!
//! `RefCleanError` covers file, configuration and report failures in the
//! outer layers. `SourceError` never leaves a source adapter: every variant
//! collapses to "no result" at the `SourceAdapter::search` boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RefCleanError>;

#[derive(Error, Debug)]
pub enum RefCleanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Failure of a single provider lookup.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("rate limited or blocked by provider")]
    RateLimited,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no results")]
    Empty,
}
