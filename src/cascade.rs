//! Waterfall search across sources in fixed priority order.
//!
//! The first source that returns a candidate wins; lower-priority sources are
//! not consulted for that title, whatever the quality of the hit. The guarded
//! source (the scraper) is tracked by a run-scoped circuit breaker and is
//! skipped for the rest of the run once it trips.

use crate::models::{CandidateRecord, SourceTag};
use crate::sources::SourceAdapter;
use tracing::{debug, warn};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Circuit-breaker state for one run.
///
/// Owned by the batch runner, created fresh at the start of every run and
/// passed by reference into each cascade resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeState {
    pub consecutive_failures: u32,
    pub blocked: bool,
    threshold: u32,
}

impl Default for CascadeState {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD)
    }
}

impl CascadeState {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            blocked: false,
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Record a miss. Returns true when this miss trips the breaker.
    pub fn record_failure(&mut self) -> bool {
        if self.blocked {
            return false;
        }
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            self.blocked = true;
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        if !self.blocked {
            self.consecutive_failures = 0;
        }
    }
}

/// Ordered list of sources.
pub struct Cascade {
    sources: Vec<Box<dyn SourceAdapter>>,
}

impl Cascade {
    pub fn new(sources: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> impl Iterator<Item = SourceTag> + '_ {
        self.sources.iter().map(|s| s.tag())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Query sources in order and return the first hit.
    pub async fn resolve(&self, title: &str, state: &mut CascadeState) -> Option<CandidateRecord> {
        for source in &self.sources {
            let tag = source.tag();
            let guarded = source.guarded();

            if guarded && state.blocked {
                debug!(source = %tag, "skipping blocked source");
                continue;
            }

            match source.search(title).await {
                Some(candidate) => {
                    if guarded {
                        state.record_success();
                    }
                    return Some(candidate);
                }
                None => {
                    if guarded && state.record_failure() {
                        warn!(
                            source = %tag,
                            failures = state.consecutive_failures,
                            "source disabled for the rest of this run"
                        );
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "cascade_test.rs"]
mod cascade_test;
