//! External bibliographic sources.
//!
//! Each provider is a `SourceAdapter`: it takes a free-text title query and
//! returns the provider's first hit as a normalized `CandidateRecord`, or
//! `None`. Network errors, timeouts, malformed payloads, empty result sets and
//! rate-limit rejections all collapse to `None` here; nothing is raised past
//! this boundary.
//!
//! - `google_scholar`: scraped search page, best coverage, blocks easily
//! - `semantic_scholar`: graph API, stable and free
//! - `crossref`: DOI registry, authoritative but weak at fuzzy queries

mod crossref;
mod google_scholar;
mod semantic_scholar;

pub use crossref::{parse_crossref_response, CrossrefSource};
pub use google_scholar::{parse_scholar_html, GoogleScholarSource};
pub use semantic_scholar::{parse_semantic_scholar_response, SemanticScholarSource};

use crate::config::Config;
use crate::error::{Result, SourceError};
use crate::models::{CandidateRecord, SourceTag};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::debug;

/// User-Agent sent to the API providers.
pub const USER_AGENT: &str = concat!("refclean/", env!("CARGO_PKG_VERSION"));

/// Browser-like User-Agent for the scraped search page.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// Whether misses from this source feed the run's circuit breaker.
    fn guarded(&self) -> bool {
        false
    }

    /// First hit for `title`, or `None` on any failure.
    async fn search(&self, title: &str) -> Option<CandidateRecord>;
}

/// Build the adapters in configured priority order.
pub fn build_sources(config: &Config) -> Result<Vec<Box<dyn SourceAdapter>>> {
    let mut sources: Vec<Box<dyn SourceAdapter>> = Vec::new();
    for tag in config.source_order()? {
        let source: Box<dyn SourceAdapter> = match tag {
            SourceTag::GoogleScholar => Box::new(GoogleScholarSource::new(&config.sources)?),
            SourceTag::SemanticScholar => Box::new(SemanticScholarSource::new(&config.sources)?),
            SourceTag::Crossref => Box::new(CrossrefSource::new(&config.sources)?),
        };
        sources.push(source);
    }
    Ok(sources)
}

fn http_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    if let Ok(value) = header::HeaderValue::from_str(user_agent) {
        headers.insert(header::USER_AGENT, value);
    }
    Ok(Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()?)
}

/// Map a response status to an error for anything but success.
fn check_status(status: reqwest::StatusCode) -> std::result::Result<(), SourceError> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SourceError::RateLimited);
    }
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }
    Ok(())
}

/// Collapse a lookup result to the adapter contract.
fn collapse(
    tag: SourceTag,
    title: &str,
    result: std::result::Result<CandidateRecord, SourceError>,
) -> Option<CandidateRecord> {
    match result {
        Ok(candidate) => {
            debug!(source = %tag, found = %candidate.title, "source hit");
            Some(candidate)
        }
        Err(e) => {
            debug!(source = %tag, query = %title, error = %e, "source miss");
            None
        }
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
