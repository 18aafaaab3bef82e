//! Data models for citation verification.
//!
//! This module contains the core data structures shared by the source adapters,
//! the cascade, the citation processor and the batch runner, plus the report
//! and progress types handed to the presentation layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Citations
// ============================================================================

/// A single citation as claimed by the input bibliography.
///
/// Identity is positional within the input collection. Field names follow the
/// structured bibliography format (`title`, `year`, `author`, `journal`, `note`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub year: Option<String>,
    pub author: Option<String>,
    pub journal: Option<String>,
    /// Free-form annotation recording the provenance of any correction.
    pub note: Option<String>,
}

impl Citation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Sources and Candidates
// ============================================================================

/// The external provider that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    GoogleScholar,
    SemanticScholar,
    Crossref,
}

impl SourceTag {
    /// Configuration name of the source (`google_scholar`, ...).
    pub fn key(&self) -> &'static str {
        match self {
            SourceTag::GoogleScholar => "google_scholar",
            SourceTag::SemanticScholar => "semantic_scholar",
            SourceTag::Crossref => "crossref",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "google_scholar" => Some(SourceTag::GoogleScholar),
            "semantic_scholar" => Some(SourceTag::SemanticScholar),
            "crossref" => Some(SourceTag::Crossref),
            _ => None,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceTag::GoogleScholar => "Google Scholar",
            SourceTag::SemanticScholar => "Semantic Scholar",
            SourceTag::Crossref => "Crossref",
        };
        f.write_str(name)
    }
}

/// Normalized first-hit record returned by a source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    pub year: Option<i32>,
    /// All author names joined with `" and "`, in source order.
    pub author: String,
    pub journal: Option<String>,
    pub source: SourceTag,
}

/// Separator used when joining author names into a single field.
pub const AUTHOR_SEPARATOR: &str = " and ";

impl CandidateRecord {
    /// Build a candidate, returning `None` when the title is empty.
    ///
    /// A candidate without a title is equivalent to no result.
    pub fn new(
        source: SourceTag,
        title: &str,
        year: Option<i32>,
        authors: &[String],
        journal: Option<&str>,
    ) -> Option<Self> {
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            return None;
        }

        let author = authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(AUTHOR_SEPARATOR);

        let journal = journal
            .map(|j| j.trim().to_string())
            .filter(|j| !j.is_empty());

        Some(Self {
            title,
            year,
            author,
            journal,
            source,
        })
    }
}

// ============================================================================
// Verification Outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Ambiguous,
    Hallucinated,
    NotFound,
    Skipped,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VerificationStatus::Verified => "Verified",
            VerificationStatus::Ambiguous => "Ambiguous",
            VerificationStatus::Hallucinated => "Hallucination?",
            VerificationStatus::NotFound => "Not Found",
            VerificationStatus::Skipped => "Skipped",
        };
        f.write_str(label)
    }
}

/// One field rewritten on a citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<String>,
    pub after: String,
}

/// Result of verifying one citation. Exactly one is produced per citation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub status: VerificationStatus,
    /// Normalized title that was queried.
    pub original_title: String,
    pub candidate: Option<CandidateRecord>,
    /// Similarity 0-100; present only when a candidate was scored.
    pub score: Option<u8>,
    pub source: Option<SourceTag>,
    /// Metadata fields overwritten on the citation (annotation excluded).
    pub changes: Vec<FieldChange>,
    /// Annotation written to the citation, if any.
    pub annotation: Option<String>,
}

impl VerificationOutcome {
    /// The year written by a verified correction, if the year changed.
    pub fn corrected_year(&self) -> Option<&str> {
        self.changes
            .iter()
            .find(|c| c.field == "year")
            .map(|c| c.after.as_str())
    }

    /// Short status label, e.g. `Verified (97%)`.
    pub fn status_label(&self) -> String {
        match (self.status, self.score) {
            (VerificationStatus::Verified, Some(score))
            | (VerificationStatus::Ambiguous, Some(score)) => {
                format!("{} ({}%)", self.status, score)
            }
            _ => self.status.to_string(),
        }
    }
}

// ============================================================================
// Free-Text Lines
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Matched,
    LowConfidence,
    NotFound,
    Skipped,
}

impl fmt::Display for LineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LineStatus::Matched => "Match",
            LineStatus::LowConfidence => "Low Confidence",
            LineStatus::NotFound => "Not Found",
            LineStatus::Skipped => "Skipped",
        };
        f.write_str(label)
    }
}

/// Result of checking one free-text reference line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineOutcome {
    /// The line exactly as it appeared in the document (trimmed).
    pub original: String,
    /// The query built from the line after marker stripping.
    pub query: String,
    pub status: LineStatus,
    pub candidate: Option<CandidateRecord>,
    pub score: Option<u8>,
}

// ============================================================================
// Reports
// ============================================================================

/// One row of the tabular verification report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub index: usize,
    pub original_title: String,
    pub status: String,
    pub score: Option<u8>,
    pub source: String,
    pub corrected_year: Option<String>,
    pub note: Option<String>,
}

// ============================================================================
// Progress
// ============================================================================

/// Running statistics for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub total: usize,
    pub processed: usize,
    pub verified: usize,
    pub ambiguous: usize,
    pub hallucinated: usize,
    pub not_found: usize,
    pub skipped: usize,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// `None` until the first item completes.
    #[serde(with = "option_duration_secs")]
    pub eta: Option<Duration>,
    /// Items per minute.
    pub throughput: f64,
}

impl RunStats {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }

    pub fn eta_display(&self) -> String {
        match self.eta {
            Some(eta) => format_duration(eta),
            None => "calculating".to_string(),
        }
    }
}

/// Event emitted after each item of a batch completes.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Zero-based position of the item in the input.
    pub index: usize,
    pub total: usize,
    pub title: String,
    /// Lines report the counter they were tallied under.
    pub status: VerificationStatus,
    pub label: String,
    pub stats: RunStats,
}

/// Format a duration as `1h02m03s`, `2m05s` or `42s`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

mod option_duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }
}
