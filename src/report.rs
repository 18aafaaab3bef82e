//! Verification reports: tabular rows, CSV and JSON exports, and the plain-text
//! report produced for free-text reference lists.

use crate::error::Result;
use crate::models::{LineOutcome, LineStatus, ReportRow, RunStats, VerificationOutcome};
use chrono::Utc;
use serde::Serialize;
use std::io::Write;

pub const TEXT_REPORT_HEADER: &str = "=== Validation Report ===";
const SEPARATOR_WIDTH: usize = 30;

/// One row per outcome, in input order. `index` is 1-based.
pub fn report_rows(outcomes: &[VerificationOutcome]) -> Vec<ReportRow> {
    outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| ReportRow {
            index: i + 1,
            original_title: outcome.original_title.clone(),
            status: outcome.status_label(),
            score: outcome.score,
            source: outcome.source.map(|s| s.to_string()).unwrap_or_default(),
            corrected_year: outcome.corrected_year().map(|y| y.to_string()),
            note: outcome.annotation.clone(),
        })
        .collect()
}

/// Write rows as CSV with a header line.
pub fn write_csv<W: Write>(rows: &[ReportRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn csv_string(rows: &[ReportRow]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[derive(Serialize)]
struct JsonExport<'a> {
    generated_at: String,
    stats: &'a RunStats,
    outcomes: &'a [VerificationOutcome],
}

/// Pretty-printed JSON export of a run.
pub fn export_json(outcomes: &[VerificationOutcome], stats: &RunStats) -> Result<String> {
    let export = JsonExport {
        generated_at: Utc::now().to_rfc3339(),
        stats,
        outcomes,
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

fn line_verdict(outcome: &LineOutcome) -> String {
    let score = outcome.score.unwrap_or(0);
    match (&outcome.status, &outcome.candidate) {
        (LineStatus::Matched, Some(c)) => {
            let year = c.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string());
            let mut verdict = format!("MATCH ({}, {}%): {} ({})", c.source, score, c.title, year);
            if let Some(journal) = &c.journal {
                verdict.push(' ');
                verdict.push_str(journal);
            }
            verdict
        }
        (LineStatus::LowConfidence, Some(c)) => {
            format!("LOW CONFIDENCE ({}, {}%): found '{}'", c.source, score, c.title)
        }
        (LineStatus::Skipped, _) => "SKIPPED (nothing to search for)".to_string(),
        _ => "NOT FOUND in any database (likely hallucination)".to_string(),
    }
}

/// Render the plain-text report for a free-text run.
pub fn render_text_report(lines: &[LineOutcome]) -> String {
    let mut report = format!("{}\n\n", TEXT_REPORT_HEADER);
    let separator = "-".repeat(SEPARATOR_WIDTH);
    for outcome in lines {
        report.push_str(&format!("Original: {}\n", outcome.original));
        report.push_str(&line_verdict(outcome));
        report.push('\n');
        report.push_str(&separator);
        report.push('\n');
    }
    report
}
