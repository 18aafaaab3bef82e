//! refclean library - citation verification against external bibliographic
//! databases.
//!
//! A bibliography (BibTeX or a plain-text reference list) is checked entry by
//! entry through a cascade of sources. Entries that match an indexed
//! publication closely enough are corrected from the authoritative metadata;
//! everything else is annotated so possibly fabricated references stand out.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub mod batch;
pub mod bibtex;
pub mod cascade;
pub mod config;
pub mod document;
pub mod error;
pub mod handlers;
pub mod models;
pub mod processor;
pub mod report;
pub mod scoring;
pub mod sources;

#[cfg(test)]
pub(crate) mod test_support;

use batch::{BatchReport, BatchRunner, LineReport};
use bibtex::BibFile;
use cascade::Cascade;
use config::Config;
use error::{RefCleanError, Result};
use models::ProgressEvent;
use scoring::MatchPolicy;

// ============================================================================
// Application State
// ============================================================================

pub struct AppState {
    pub config: Config,
    pub cascade: Arc<Cascade>,
    /// Held for the duration of a run; runs never overlap.
    pub run_lock: Mutex<()>,
}

impl AppState {
    /// Build the configured sources and wrap them in a cascade.
    pub fn new(config: Config) -> Result<Self> {
        let sources = sources::build_sources(&config)?;
        Ok(Self::with_cascade(config, Cascade::new(sources)))
    }

    pub fn with_cascade(config: Config, cascade: Cascade) -> Self {
        Self {
            config,
            cascade: Arc::new(cascade),
            run_lock: Mutex::new(()),
        }
    }
}

// ============================================================================
// Runs
// ============================================================================

/// A verified bibliography: the corrected file plus the run report.
pub struct BibRun {
    pub bib: BibFile,
    pub report: BatchReport,
}

impl BibRun {
    pub fn bibtex(&self) -> String {
        self.bib.to_bibtex()
    }
}

/// Verify every entry of a BibTeX document.
pub async fn verify_bibliography<F>(
    cascade: &Cascade,
    config: &Config,
    content: &str,
    cancel: CancellationToken,
    on_progress: F,
) -> Result<BibRun>
where
    F: FnMut(&ProgressEvent),
{
    if content.trim().is_empty() {
        return Err(RefCleanError::InvalidInput("empty bibliography".to_string()));
    }
    let mut bib = BibFile::parse(content);
    if bib.entries.is_empty() {
        warn!("no BibTeX entries found");
    }

    let citations = bib.entries.iter().map(|e| e.to_citation()).collect();
    let runner = BatchRunner::new(cascade, MatchPolicy::from(&config.matching), config.breaker.failure_threshold)
        .with_cancellation(cancel);
    let report = runner.run_citations(citations, on_progress).await;

    for (entry, citation) in bib.entries.iter_mut().zip(&report.citations) {
        entry.apply_citation(citation);
    }

    Ok(BibRun { bib, report })
}

/// Check every reference line of a plain-text document.
pub async fn verify_document<F>(
    cascade: &Cascade,
    config: &Config,
    content: &str,
    cancel: CancellationToken,
    on_progress: F,
) -> Result<LineReport>
where
    F: FnMut(&ProgressEvent),
{
    if content.trim().is_empty() {
        return Err(RefCleanError::InvalidInput("empty document".to_string()));
    }
    let lines = document::extract_lines(content, config.input.min_line_chars);
    if lines.is_empty() {
        warn!(
            min_chars = config.input.min_line_chars,
            "no reference lines long enough to check"
        );
    }

    let runner = BatchRunner::new(cascade, MatchPolicy::from(&config.matching), config.breaker.failure_threshold)
        .with_cancellation(cancel);
    Ok(runner.run_lines(lines, on_progress).await)
}

// Re-export commonly used types
pub use models::{
    CandidateRecord, Citation, FieldChange, LineOutcome, LineStatus, ReportRow, RunStats,
    SourceTag, VerificationOutcome, VerificationStatus,
};

pub use cascade::CascadeState;
pub use processor::CitationProcessor;
pub use sources::{
    build_sources, CrossrefSource, GoogleScholarSource, SemanticScholarSource, SourceAdapter,
};
