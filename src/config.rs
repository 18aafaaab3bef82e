//! Configuration loading.
//!
//! Every field has a default, so an empty or missing file yields a working
//! configuration. A handful of secrets can also come from the environment.

use crate::error::{RefCleanError, Result};
use crate::models::SourceTag;
use crate::scoring::ScoreMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENV_S2_API_KEY: &str = "SEMANTIC_SCHOLAR_API_KEY";
pub const ENV_CROSSREF_MAILTO: &str = "CROSSREF_MAILTO";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: SourcesConfig,
    pub breaker: BreakerConfig,
    pub matching: MatchingConfig,
    pub input: InputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Cascade priority order, highest first.
    pub order: Vec<String>,
    pub google_scholar_url: String,
    pub semantic_scholar_url: String,
    pub crossref_url: String,
    pub http_timeout_secs: u64,
    pub scholar_timeout_secs: u64,
    pub scholar_delay_min_ms: u64,
    pub scholar_delay_max_ms: u64,
    pub api_delay_ms: u64,
    pub semantic_scholar_api_key: Option<String>,
    pub crossref_mailto: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            order: vec![
                "google_scholar".to_string(),
                "semantic_scholar".to_string(),
                "crossref".to_string(),
            ],
            google_scholar_url: "https://scholar.google.com".to_string(),
            semantic_scholar_url: "https://api.semanticscholar.org".to_string(),
            crossref_url: "https://api.crossref.org".to_string(),
            http_timeout_secs: 5,
            scholar_timeout_secs: 10,
            scholar_delay_min_ms: 1000,
            scholar_delay_max_ms: 2000,
            api_delay_ms: 500,
            semantic_scholar_api_key: None,
            crossref_mailto: None,
        }
    }
}

impl SourcesConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn scholar_timeout(&self) -> Duration {
        Duration::from_secs(self.scholar_timeout_secs)
    }

    pub fn api_delay(&self) -> Duration {
        Duration::from_millis(self.api_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive misses from the guarded source before it is skipped.
    pub failure_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub verified_above: u8,
    pub ambiguous_above: u8,
    pub line_accept_above: u8,
    pub line_mode: ScoreMode,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            verified_above: 85,
            ambiguous_above: 50,
            line_accept_above: 80,
            line_mode: ScoreMode::Partial,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Free-text lines with this many characters or fewer are dropped.
    pub min_line_chars: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { min_line_chars: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file, apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ENV_S2_API_KEY) {
            if !key.trim().is_empty() {
                self.sources.semantic_scholar_api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(mailto) = std::env::var(ENV_CROSSREF_MAILTO) {
            if !mailto.trim().is_empty() {
                self.sources.crossref_mailto = Some(mailto.trim().to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.matching;
        if m.verified_above > 100 || m.line_accept_above > 100 {
            return Err(RefCleanError::InvalidConfig(
                "thresholds must be between 0 and 100".to_string(),
            ));
        }
        if m.ambiguous_above >= m.verified_above {
            return Err(RefCleanError::InvalidConfig(format!(
                "ambiguous_above ({}) must be below verified_above ({})",
                m.ambiguous_above, m.verified_above
            )));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(RefCleanError::InvalidConfig(
                "breaker.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.sources.scholar_delay_min_ms > self.sources.scholar_delay_max_ms {
            return Err(RefCleanError::InvalidConfig(
                "scholar_delay_min_ms must not exceed scholar_delay_max_ms".to_string(),
            ));
        }
        self.source_order().map(|_| ())
    }

    /// Resolve the configured order into source tags.
    pub fn source_order(&self) -> Result<Vec<SourceTag>> {
        if self.sources.order.is_empty() {
            return Err(RefCleanError::InvalidConfig(
                "sources.order must name at least one source".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        for name in &self.sources.order {
            let tag = SourceTag::from_key(name).ok_or_else(|| {
                RefCleanError::InvalidConfig(format!("unknown source: {}", name))
            })?;
            if !seen.insert(tag) {
                return Err(RefCleanError::InvalidConfig(format!(
                    "source listed twice: {}",
                    name
                )));
            }
            order.push(tag);
        }
        Ok(order)
    }
}
