//! Google Scholar search page scraper.
//!
//! There is no API, so the first organic result is pulled out of the result
//! HTML: the `gs_rt` heading carries the title and the `gs_a` byline carries
//! `authors - venue, year - host`. Scholar blocks automated clients quickly,
//! which is why this source is the one guarded by the circuit breaker.

use super::{check_status, collapse, http_client, trim_base, SourceAdapter, BROWSER_USER_AGENT};
use crate::config::SourcesConfig;
use crate::error::{Result, SourceError};
use crate::models::{CandidateRecord, SourceTag};
use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::sleep;

pub struct GoogleScholarSource {
    client: Client,
    base_url: String,
    delay_min_ms: u64,
    delay_max_ms: u64,
}

impl GoogleScholarSource {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.scholar_timeout(), BROWSER_USER_AGENT)?,
            base_url: trim_base(&config.google_scholar_url),
            delay_min_ms: config.scholar_delay_min_ms,
            delay_max_ms: config.scholar_delay_max_ms.max(config.scholar_delay_min_ms),
        })
    }

    fn jitter(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(self.delay_min_ms..=self.delay_max_ms);
        Duration::from_millis(ms)
    }

    async fn lookup(&self, title: &str) -> std::result::Result<CandidateRecord, SourceError> {
        let url = format!(
            "{}/scholar?hl=en&q={}",
            self.base_url,
            urlencoding::encode(title)
        );

        let response = self.client.get(&url).send().await?;
        check_status(response.status())?;

        let html = response.text().await?;
        parse_scholar_html(&html)
    }
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)<h3[^>]*class="gs_rt"[^>]*>(.*?)</h3>"#).unwrap())
}

fn byline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)<div[^>]*class="gs_a"[^>]*>(.*?)</div>"#).unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

fn type_marker_re() -> &'static Regex {
    // [PDF], [HTML], [BOOK][B], [CITATION][C]
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\s*\[[A-Z]{1,10}\])+\s*").unwrap())
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(1[6-9]\d{2}|20\d{2})\b").unwrap())
}

fn html_entity_decode(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace('\u{a0}', " ")
        .replace("&hellip;", "…")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&#x27;", "'")
}

fn to_text(html: &str) -> String {
    let text = html_entity_decode(&tag_re().replace_all(html, ""));
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_blocked(html: &str) -> bool {
    let lower = html.to_lowercase();
    lower.contains("gs_captcha") || lower.contains("unusual traffic") || lower.contains("/sorry/")
}

/// Extract the first result from a Scholar result page.
pub fn parse_scholar_html(html: &str) -> std::result::Result<CandidateRecord, SourceError> {
    if is_blocked(html) {
        return Err(SourceError::RateLimited);
    }

    let caps = title_re().captures(html).ok_or(SourceError::Empty)?;
    let heading = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let title_text = to_text(heading);
    let title = type_marker_re().replace(&title_text, "").to_string();

    let after_heading = caps.get(0).map(|m| &html[m.end()..]).unwrap_or("");
    let byline = byline_re()
        .captures(after_heading)
        .and_then(|c| c.get(1))
        .map(|m| to_text(m.as_str()))
        .unwrap_or_default();

    let parts: Vec<&str> = byline.split(" - ").map(|p| p.trim()).collect();

    let authors: Vec<String> = parts
        .first()
        .map(|names| {
            names
                .split(',')
                .map(|n| n.trim().trim_end_matches('…').trim().to_string())
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let (year, journal) = match parts.get(1) {
        Some(middle) => {
            let year = year_re()
                .captures(middle)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<i32>().ok());
            // A two-part byline ends in the host name, not a venue
            let journal = if parts.len() >= 3 {
                let venue = year_re().replace(middle, "");
                let venue = venue
                    .trim_matches(|c: char| c == ',' || c.is_whitespace())
                    .trim_end_matches('…')
                    .trim()
                    .to_string();
                Some(venue).filter(|v| !v.is_empty())
            } else {
                None
            };
            (year, journal)
        }
        None => (None, None),
    };

    CandidateRecord::new(
        SourceTag::GoogleScholar,
        &title,
        year,
        &authors,
        journal.as_deref(),
    )
    .ok_or(SourceError::Empty)
}

#[async_trait]
impl SourceAdapter for GoogleScholarSource {
    fn tag(&self) -> SourceTag {
        SourceTag::GoogleScholar
    }

    fn guarded(&self) -> bool {
        true
    }

    async fn search(&self, title: &str) -> Option<CandidateRecord> {
        let pause = self.jitter();
        sleep(pause).await;
        collapse(self.tag(), title, self.lookup(title).await)
    }
}
