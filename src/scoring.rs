//! Fuzzy title similarity and the threshold policies built on it.
//!
//! All comparisons are case-insensitive and return an integer in `0..=100`.
//! `ratio` is the Indel similarity `2 * LCS / (|a| + |b|)` over the whole
//! strings and penalizes prefix/suffix noise. `partial_ratio` and `token_set_ratio` are
//! meant for free-text lines that carry authors, numbering or venue text
//! around the title, and do not penalize that noise.

use crate::models::VerificationStatus;
use crate::config::MatchingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    Ratio,
    Partial,
    TokenSet,
}

pub fn score(claimed: &str, candidate_title: &str, mode: ScoreMode) -> u8 {
    match mode {
        ScoreMode::Ratio => ratio(claimed, candidate_title),
        ScoreMode::Partial => partial_ratio(claimed, candidate_title),
        ScoreMode::TokenSet => token_set_ratio(claimed, candidate_title),
    }
}

fn to_percent(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Length of the longest common subsequence.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Indel similarity: twice the LCS over the summed lengths.
fn indel_similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(a, b) as f64 / total as f64
}

/// Whole-string Indel similarity.
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() || b.is_empty() {
        return if a == b { 100 } else { 0 };
    }
    to_percent(indel_similarity(&a, &b))
}

/// Best similarity of the shorter string against every same-length window
/// of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    let mut best = 0.0f64;
    for window in long.windows(short.len()) {
        let sim = indel_similarity(short, window);
        if sim > best {
            best = sim;
            if best >= 1.0 {
                break;
            }
        }
    }
    to_percent(best)
}

fn tokens(s: &str) -> BTreeSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn join_tokens<'a>(parts: impl IntoIterator<Item = &'a String>) -> String {
    parts.into_iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
}

/// Token-set comparison: shared tokens count fully, extra tokens on either
/// side only dilute the score against the shared core.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0;
    }

    let sect = join_tokens(ta.intersection(&tb));
    let only_a = join_tokens(ta.difference(&tb));
    let only_b = join_tokens(tb.difference(&ta));

    let combined_a = [sect.as_str(), only_a.as_str()].join(" ").trim().to_string();
    let combined_b = [sect.as_str(), only_b.as_str()].join(" ").trim().to_string();

    let mut best = ratio(&combined_a, &combined_b);
    if !sect.is_empty() {
        best = best
            .max(ratio(&sect, &combined_a))
            .max(ratio(&sect, &combined_b));
    }
    best
}

// ============================================================================
// Threshold Policies
// ============================================================================

/// Thresholds mapping a score to an outcome.
///
/// BibTeX flow: `score > verified_above` is Verified, `score > ambiguous_above`
/// is Ambiguous, anything else is Hallucinated. The free-text flow has a single
/// cut: `score > line_accept_above` is an accepted match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    pub verified_above: u8,
    pub ambiguous_above: u8,
    pub line_accept_above: u8,
    pub line_mode: ScoreMode,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::from(&MatchingConfig::default())
    }
}

impl From<&MatchingConfig> for MatchPolicy {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            verified_above: config.verified_above,
            ambiguous_above: config.ambiguous_above,
            line_accept_above: config.line_accept_above,
            line_mode: config.line_mode,
        }
    }
}

impl MatchPolicy {
    pub fn classify(&self, score: u8) -> VerificationStatus {
        if score > self.verified_above {
            VerificationStatus::Verified
        } else if score > self.ambiguous_above {
            VerificationStatus::Ambiguous
        } else {
            VerificationStatus::Hallucinated
        }
    }

    pub fn accepts_line(&self, score: u8) -> bool {
        score > self.line_accept_above
    }
}
