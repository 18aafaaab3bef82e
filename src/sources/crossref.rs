//! Crossref works API: `/works?query.bibliographic=...&rows=1`.

use super::{check_status, collapse, http_client, trim_base, SourceAdapter, USER_AGENT};
use crate::config::SourcesConfig;
use crate::error::{Result, SourceError};
use crate::models::{CandidateRecord, SourceTag};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;

pub struct CrossrefSource {
    client: Client,
    base_url: String,
    delay: Duration,
}

impl CrossrefSource {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        // Crossref routes requests carrying a contact address to its polite pool
        let user_agent = match config.crossref_mailto {
            Some(ref mailto) => format!("{} (mailto:{})", USER_AGENT, mailto),
            None => USER_AGENT.to_string(),
        };
        Ok(Self {
            client: http_client(config.http_timeout(), &user_agent)?,
            base_url: trim_base(&config.crossref_url),
            delay: config.api_delay(),
        })
    }

    async fn lookup(&self, title: &str) -> std::result::Result<CandidateRecord, SourceError> {
        let url = format!(
            "{}/works?query.bibliographic={}&rows=1",
            self.base_url,
            urlencoding::encode(title)
        );

        let response = self.client.get(&url).send().await?;
        check_status(response.status())?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        parse_crossref_response(&json)
    }
}

/// First year from a `{"date-parts": [[2016, 5, 1]]}` object.
fn date_parts_year(date: Option<&serde_json::Value>) -> Option<i32> {
    date.and_then(|d| d.get("date-parts"))
        .and_then(|d| d.as_array())
        .and_then(|a| a.first())
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|y| y.as_i64())
        .and_then(|y| i32::try_from(y).ok())
}

fn first_string(value: Option<&serde_json::Value>) -> Option<&str> {
    value
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|v| v.as_str())
}

/// Parse a works search response and normalize its first item.
///
/// Year comes from `published-print`, falling back to `created`.
pub fn parse_crossref_response(
    json: &serde_json::Value,
) -> std::result::Result<CandidateRecord, SourceError> {
    let items = json
        .get("message")
        .and_then(|m| m.get("items"))
        .and_then(|i| i.as_array())
        .ok_or_else(|| SourceError::Malformed("missing message.items".to_string()))?;
    let item = items.first().ok_or(SourceError::Empty)?;

    let title = first_string(item.get("title")).unwrap_or("");

    let authors: Vec<String> = item
        .get("author")
        .and_then(|a| a.as_array())
        .map(|authors| {
            authors
                .iter()
                .filter_map(|a| {
                    let given = a.get("given").and_then(|g| g.as_str()).unwrap_or("");
                    let family = a.get("family").and_then(|f| f.as_str()).unwrap_or("");
                    let name = format!("{} {}", given, family).trim().to_string();
                    if name.is_empty() {
                        // Consortium authors only carry a name
                        a.get("name").and_then(|n| n.as_str()).map(|s| s.to_string())
                    } else {
                        Some(name)
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let year = date_parts_year(item.get("published-print"))
        .or_else(|| date_parts_year(item.get("created")));

    let journal = first_string(item.get("container-title"));

    CandidateRecord::new(SourceTag::Crossref, title, year, &authors, journal)
        .ok_or(SourceError::Empty)
}

#[async_trait]
impl SourceAdapter for CrossrefSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Crossref
    }

    async fn search(&self, title: &str) -> Option<CandidateRecord> {
        sleep(self.delay).await;
        collapse(self.tag(), title, self.lookup(title).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_prefers_print_date() {
        let body = json!({
            "status": "ok",
            "message": {
                "total-results": 1,
                "items": [{
                    "title": ["Attention Is All You Need"],
                    "author": [
                        {"given": "Ashish", "family": "Vaswani"},
                        {"given": "Noam", "family": "Shazeer"}
                    ],
                    "container-title": ["Advances in Neural Information Processing Systems"],
                    "published-print": {"date-parts": [[2017, 12]]},
                    "created": {"date-parts": [[2018, 1, 3]]}
                }]
            }
        });
        let c = parse_crossref_response(&body).unwrap();
        assert_eq!(c.title, "Attention Is All You Need");
        assert_eq!(c.year, Some(2017));
        assert_eq!(c.author, "Ashish Vaswani and Noam Shazeer");
        assert_eq!(
            c.journal.as_deref(),
            Some("Advances in Neural Information Processing Systems")
        );
    }

    #[test]
    fn test_parse_falls_back_to_created_date() {
        let body = json!({"message": {"items": [{
            "title": ["A Paper"],
            "created": {"date-parts": [[2020, 2, 2]]}
        }]}});
        let c = parse_crossref_response(&body).unwrap();
        assert_eq!(c.year, Some(2020));
        assert_eq!(c.author, "");
        assert_eq!(c.journal, None);
    }

    #[test]
    fn test_parse_without_dates_leaves_year_unset() {
        let body = json!({"message": {"items": [{
            "title": ["A Paper"],
            "published-print": {"date-parts": [[null]]},
            "container-title": []
        }]}});
        let c = parse_crossref_response(&body).unwrap();
        assert_eq!(c.year, None);
    }

    #[test]
    fn test_out_of_range_year_is_ignored() {
        // 2^32 + 2016 would wrap to 2016 if narrowed
        let body = json!({"message": {"items": [{
            "title": ["A Paper"],
            "published-print": {"date-parts": [[4294969312_i64]]},
            "created": {"date-parts": [[2018, 1, 1]]}
        }]}});
        let c = parse_crossref_response(&body).unwrap();
        assert_eq!(c.year, Some(2018));

        let body = json!({"message": {"items": [{
            "title": ["A Paper"],
            "created": {"date-parts": [[99999999999_i64]]}
        }]}});
        assert_eq!(parse_crossref_response(&body).unwrap().year, None);
    }

    #[test]
    fn test_parse_empty_items() {
        let body = json!({"message": {"items": []}});
        assert!(matches!(parse_crossref_response(&body), Err(SourceError::Empty)));
    }

    #[test]
    fn test_parse_missing_title_is_empty() {
        let body = json!({"message": {"items": [{"title": [], "author": []}]}});
        assert!(matches!(parse_crossref_response(&body), Err(SourceError::Empty)));
    }

    #[test]
    fn test_parse_unexpected_shape() {
        let body = json!({"status": "error"});
        assert!(matches!(
            parse_crossref_response(&body),
            Err(SourceError::Malformed(_))
        ));
    }
}
