//! Semantic Scholar graph API: `/graph/v1/paper/search`.

use super::{check_status, collapse, http_client, trim_base, SourceAdapter, USER_AGENT};
use crate::config::SourcesConfig;
use crate::error::{Result, SourceError};
use crate::models::{CandidateRecord, SourceTag};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

const SEARCH_FIELDS: &str = "title,authors,year,venue";

pub struct SemanticScholarSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    delay: Duration,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
struct Paper {
    title: Option<String>,
    year: Option<i32>,
    venue: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

impl SemanticScholarSource {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.http_timeout(), USER_AGENT)?,
            base_url: trim_base(&config.semantic_scholar_url),
            api_key: config.semantic_scholar_api_key.clone(),
            delay: config.api_delay(),
        })
    }

    async fn lookup(&self, title: &str) -> std::result::Result<CandidateRecord, SourceError> {
        let url = format!(
            "{}/graph/v1/paper/search?query={}&limit=1&fields={}",
            self.base_url,
            urlencoding::encode(title),
            SEARCH_FIELDS
        );

        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        check_status(response.status())?;

        let body = response.text().await?;
        parse_semantic_scholar_response(&body)
    }
}

/// Parse a paper search response and normalize its first hit.
pub fn parse_semantic_scholar_response(
    body: &str,
) -> std::result::Result<CandidateRecord, SourceError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    if response.total == 0 {
        return Err(SourceError::Empty);
    }
    let paper = response.data.into_iter().next().ok_or(SourceError::Empty)?;

    let authors: Vec<String> = paper.authors.into_iter().filter_map(|a| a.name).collect();

    CandidateRecord::new(
        SourceTag::SemanticScholar,
        paper.title.as_deref().unwrap_or(""),
        paper.year,
        &authors,
        paper.venue.as_deref(),
    )
    .ok_or(SourceError::Empty)
}

#[async_trait]
impl SourceAdapter for SemanticScholarSource {
    fn tag(&self) -> SourceTag {
        SourceTag::SemanticScholar
    }

    async fn search(&self, title: &str) -> Option<CandidateRecord> {
        sleep(self.delay).await;
        collapse(self.tag(), title, self.lookup(title).await)
    }
}
