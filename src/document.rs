//! Free-text reference lists.
//!
//! Each non-trivial line of a plain-text document is treated as one citation.
//! Short lines (headings, page numbers, blank lines) are dropped before they
//! reach the cascade.

use regex::Regex;
use std::sync::OnceLock;

fn marker_re() -> &'static Regex {
    // [12] / (12) / 12. / 12)
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:\[\s*\d+\s*\]|\(\s*\d+\s*\)|\d{1,3}[.)])\s*").unwrap())
}

/// Split a document into candidate reference lines.
///
/// Lines are trimmed; lines of `min_chars` characters or fewer are discarded.
pub fn extract_lines(text: &str, min_chars: usize) -> Vec<String> {
    text.lines()
        .map(|l| l.trim())
        .filter(|l| l.chars().count() > min_chars)
        .map(|l| l.to_string())
        .collect()
}

/// Remove one leading citation marker such as `[3]` or `3.`.
pub fn strip_citation_marker(line: &str) -> String {
    marker_re().replace(line, "").trim().to_string()
}
