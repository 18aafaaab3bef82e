//! Sequential batch runner.
//!
//! Citations are processed strictly one at a time, in input order, with a
//! single circuit-breaker state shared across the run. After each item a
//! `ProgressEvent` carrying running statistics is handed to the caller's
//! callback; the runner itself knows nothing about how progress is shown.
//! A run can be cancelled between items.

use crate::cascade::{Cascade, CascadeState};
use crate::models::{
    Citation, LineOutcome, LineStatus, ProgressEvent, RunStats, VerificationOutcome,
    VerificationStatus,
};
use crate::processor::CitationProcessor;
use crate::scoring::MatchPolicy;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// `(elapsed / done) * remaining`; `None` before the first item completes.
pub fn estimate_remaining(elapsed: Duration, done: usize, remaining: usize) -> Option<Duration> {
    if done == 0 {
        return None;
    }
    Some(elapsed.div_f64(done as f64).mul_f64(remaining as f64))
}

/// Items per minute.
pub fn throughput(elapsed: Duration, done: usize) -> f64 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    if minutes <= 0.0 {
        0.0
    } else {
        done as f64 / minutes
    }
}

struct RunTracker {
    started: Instant,
    stats: RunStats,
}

impl RunTracker {
    fn new(total: usize) -> Self {
        Self {
            started: Instant::now(),
            stats: RunStats {
                total,
                ..Default::default()
            },
        }
    }

    fn record(&mut self, status: VerificationStatus) -> RunStats {
        let stats = &mut self.stats;
        stats.processed += 1;
        match status {
            VerificationStatus::Verified => stats.verified += 1,
            VerificationStatus::Ambiguous => stats.ambiguous += 1,
            VerificationStatus::Hallucinated => stats.hallucinated += 1,
            VerificationStatus::NotFound => stats.not_found += 1,
            VerificationStatus::Skipped => stats.skipped += 1,
        }
        self.refresh()
    }

    fn refresh(&mut self) -> RunStats {
        let elapsed = self.started.elapsed();
        self.stats.elapsed = elapsed;
        self.stats.eta = estimate_remaining(elapsed, self.stats.processed, self.stats.remaining());
        self.stats.throughput = throughput(elapsed, self.stats.processed);
        self.stats.clone()
    }
}

/// Map a line status onto the shared counters.
fn line_counter(status: LineStatus) -> VerificationStatus {
    match status {
        LineStatus::Matched => VerificationStatus::Verified,
        LineStatus::LowConfidence => VerificationStatus::Ambiguous,
        LineStatus::NotFound => VerificationStatus::NotFound,
        LineStatus::Skipped => VerificationStatus::Skipped,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Every input citation in input order, corrected where verified.
    /// Citations not reached before cancellation are passed through as-is.
    pub citations: Vec<Citation>,
    /// One outcome per processed citation, in input order.
    pub outcomes: Vec<VerificationOutcome>,
    pub stats: RunStats,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineReport {
    pub lines: Vec<LineOutcome>,
    pub stats: RunStats,
    pub cancelled: bool,
}

pub struct BatchRunner<'a> {
    processor: CitationProcessor<'a>,
    failure_threshold: u32,
    cancel: CancellationToken,
}

impl<'a> BatchRunner<'a> {
    pub fn new(cascade: &'a Cascade, policy: MatchPolicy, failure_threshold: u32) -> Self {
        Self {
            processor: CitationProcessor::new(cascade, policy),
            failure_threshold,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Verify a bibliography, one citation at a time.
    pub async fn run_citations<F>(&self, citations: Vec<Citation>, mut on_progress: F) -> BatchReport
    where
        F: FnMut(&ProgressEvent),
    {
        let total = citations.len();
        let mut state = CascadeState::new(self.failure_threshold);
        let mut tracker = RunTracker::new(total);
        let mut corrected = Vec::with_capacity(total);
        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;

        info!(total, "starting bibliography run");

        let mut pending = citations.into_iter();
        for (index, citation) in pending.by_ref().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(processed = index, total, "run cancelled");
                corrected.push(citation);
                cancelled = true;
                break;
            }

            let (citation, outcome) = self.processor.process(citation, &mut state).await;
            let stats = tracker.record(outcome.status);

            on_progress(&ProgressEvent {
                index,
                total,
                title: outcome.original_title.clone(),
                status: outcome.status,
                label: outcome.status_label(),
                stats,
            });

            corrected.push(citation);
            outcomes.push(outcome);
        }
        corrected.extend(pending);

        let stats = tracker.refresh();
        info!(
            processed = stats.processed,
            verified = stats.verified,
            not_found = stats.not_found,
            breaker_tripped = state.blocked,
            "bibliography run finished"
        );

        BatchReport {
            citations: corrected,
            outcomes,
            stats,
            cancelled,
        }
    }

    /// Check free-text reference lines, one at a time.
    pub async fn run_lines<F>(&self, lines: Vec<String>, mut on_progress: F) -> LineReport
    where
        F: FnMut(&ProgressEvent),
    {
        let total = lines.len();
        let mut state = CascadeState::new(self.failure_threshold);
        let mut tracker = RunTracker::new(total);
        let mut results = Vec::with_capacity(total);
        let mut cancelled = false;

        info!(total, "starting document run");

        for (index, line) in lines.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(processed = index, total, "run cancelled");
                cancelled = true;
                break;
            }

            let outcome = self.processor.process_line(line, &mut state).await;
            let stats = tracker.record(line_counter(outcome.status));

            on_progress(&ProgressEvent {
                index,
                total,
                title: outcome.query.clone(),
                status: line_counter(outcome.status),
                label: outcome.status.to_string(),
                stats,
            });

            results.push(outcome);
        }

        let stats = tracker.refresh();
        info!(
            processed = stats.processed,
            matched = stats.verified,
            breaker_tripped = state.blocked,
            "document run finished"
        );

        LineReport {
            lines: results,
            stats,
            cancelled,
        }
    }
}

#[cfg(test)]
#[path = "batch_test.rs"]
mod batch_test;
