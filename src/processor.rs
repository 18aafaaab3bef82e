//! Per-citation verification.
//!
//! A citation's metadata is only rewritten when the candidate scores above the
//! verified threshold. Weaker matches and misses only touch the annotation,
//! and fields the candidate leaves empty are never cleared.

use crate::cascade::{Cascade, CascadeState};
use crate::document::strip_citation_marker;
use crate::models::{
    CandidateRecord, Citation, FieldChange, LineOutcome, LineStatus, VerificationOutcome,
    VerificationStatus,
};
use crate::scoring::{score, MatchPolicy, ScoreMode};
use tracing::info;

pub const NOTE_NOT_FOUND: &str = "Not Found in any DB";
pub const NOTE_HALLUCINATION: &str = "Potential Hallucination";

pub fn verified_note(candidate: &CandidateRecord) -> String {
    format!("Verified by {}", candidate.source)
}

pub fn ambiguous_note(candidate: &CandidateRecord) -> String {
    format!("Ambiguous match: {}", candidate.title)
}

/// Strip brace markup and line breaks from a bibliography title.
pub fn normalize_title(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '{' && *c != '}')
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct CitationProcessor<'a> {
    cascade: &'a Cascade,
    policy: MatchPolicy,
}

impl<'a> CitationProcessor<'a> {
    pub fn new(cascade: &'a Cascade, policy: MatchPolicy) -> Self {
        Self { cascade, policy }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Verify one bibliography citation, returning the (possibly corrected)
    /// citation and its outcome.
    pub async fn process(
        &self,
        mut citation: Citation,
        state: &mut CascadeState,
    ) -> (Citation, VerificationOutcome) {
        let title = normalize_title(&citation.title);

        let mut outcome = VerificationOutcome {
            status: VerificationStatus::Skipped,
            original_title: title.clone(),
            candidate: None,
            score: None,
            source: None,
            changes: Vec::new(),
            annotation: None,
        };

        if title.is_empty() {
            info!("skipping citation without a title");
            return (citation, outcome);
        }

        let candidate = match self.cascade.resolve(&title, state).await {
            Some(candidate) => candidate,
            None => {
                outcome.status = VerificationStatus::NotFound;
                annotate(&mut citation, &mut outcome, NOTE_NOT_FOUND.to_string());
                info!(title = %title, "not found in any source");
                return (citation, outcome);
            }
        };

        let similarity = score(&title, &candidate.title, ScoreMode::Ratio);
        let status = self.policy.classify(similarity);
        outcome.status = status;
        outcome.score = Some(similarity);
        outcome.source = Some(candidate.source);

        match status {
            VerificationStatus::Verified => {
                outcome.changes = apply_candidate(&mut citation, &candidate);
                annotate(&mut citation, &mut outcome, verified_note(&candidate));
            }
            VerificationStatus::Ambiguous => {
                annotate(&mut citation, &mut outcome, ambiguous_note(&candidate));
            }
            _ => {
                annotate(&mut citation, &mut outcome, NOTE_HALLUCINATION.to_string());
            }
        }

        info!(
            title = %title,
            source = %candidate.source,
            score = similarity,
            status = %status,
            "citation checked"
        );
        outcome.candidate = Some(candidate);
        (citation, outcome)
    }

    /// Check one free-text reference line.
    pub async fn process_line(&self, line: &str, state: &mut CascadeState) -> LineOutcome {
        let original = line.trim().to_string();
        let query = strip_citation_marker(&original);

        let mut outcome = LineOutcome {
            original,
            query: query.clone(),
            status: LineStatus::Skipped,
            candidate: None,
            score: None,
        };

        if query.is_empty() {
            return outcome;
        }

        match self.cascade.resolve(&query, state).await {
            Some(candidate) => {
                let similarity = score(&query, &candidate.title, self.policy.line_mode);
                outcome.status = if self.policy.accepts_line(similarity) {
                    LineStatus::Matched
                } else {
                    LineStatus::LowConfidence
                };
                outcome.score = Some(similarity);
                info!(
                    source = %candidate.source,
                    score = similarity,
                    status = ?outcome.status,
                    "line checked"
                );
                outcome.candidate = Some(candidate);
            }
            None => {
                outcome.status = LineStatus::NotFound;
                info!(query = %query, "line not found in any source");
            }
        }
        outcome
    }
}

fn annotate(citation: &mut Citation, outcome: &mut VerificationOutcome, note: String) {
    citation.note = Some(note.clone());
    outcome.annotation = Some(note);
}

/// Overwrite citation fields from a verified candidate. Empty candidate
/// fields leave the citation untouched.
fn apply_candidate(citation: &mut Citation, candidate: &CandidateRecord) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    if citation.title != candidate.title {
        changes.push(FieldChange {
            field: "title".to_string(),
            before: Some(citation.title.clone()),
            after: candidate.title.clone(),
        });
        citation.title = candidate.title.clone();
    }

    if let Some(year) = candidate.year {
        set_field(&mut changes, "year", &mut citation.year, year.to_string());
    }
    if !candidate.author.is_empty() {
        set_field(&mut changes, "author", &mut citation.author, candidate.author.clone());
    }
    if let Some(ref journal) = candidate.journal {
        if !journal.is_empty() {
            set_field(&mut changes, "journal", &mut citation.journal, journal.clone());
        }
    }

    changes
}

fn set_field(changes: &mut Vec<FieldChange>, name: &str, field: &mut Option<String>, value: String) {
    if field.as_deref() == Some(value.as_str()) {
        return;
    }
    changes.push(FieldChange {
        field: name.to_string(),
        before: field.clone(),
        after: value.clone(),
    });
    *field = Some(value);
}

#[cfg(test)]
#[path = "processor_test.rs"]
mod processor_test;
