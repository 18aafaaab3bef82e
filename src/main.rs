//! refclean - verify and correct bibliographies against Google Scholar,
//! Semantic Scholar and Crossref.
//!
//! - `bib`: correct a BibTeX file and write a CSV/JSON report
//! - `text`: check a plain-text reference list, one citation per line
//! - `serve`: expose both flows over a small JSON API

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use refclean::config::Config;
use refclean::models::ProgressEvent;
use refclean::report::{export_json, render_text_report, report_rows, write_csv};
use refclean::{handlers, verify_bibliography, verify_document, AppState};

/// Citation verifier - catch fabricated references before they ship
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file (default: built-in settings)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a BibTeX file and write a corrected copy
    Bib {
        /// Path to the .bib file to check
        input: PathBuf,

        /// Where to write the corrected bibliography (default: <input>.cleaned.bib)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a CSV report to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Write a JSON export of all outcomes to this path
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Check a plain-text reference list
    Text {
        /// Path to the text file, one reference per line
        input: PathBuf,

        /// Write the validation report to this path instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run the HTTP API
    Serve {
        /// Address to listen on (default from config)
        #[arg(long)]
        bind: Option<String>,
    },
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("refclean=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Bib {
            input,
            output,
            report,
            json,
        } => run_bib(config, &input, output, report, json).await,
        Command::Text { input, report } => run_text(config, &input, report).await,
        Command::Serve { bind } => serve(config, bind).await,
    }
}

/// Cancel the returned token on Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current citation...");
            cancel_clone.cancel();
        }
    });
    cancel
}

fn print_progress(event: &ProgressEvent) {
    let title: String = event.title.chars().take(60).collect();
    eprintln!(
        "[{}/{}] {:<22} {}  (ETA {})",
        event.index + 1,
        event.total,
        event.label,
        title,
        event.stats.eta_display()
    );
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("cleaned.bib")
}

// ============================================================================
// BibTeX Flow
// ============================================================================

async fn run_bib(
    config: Config,
    input: &Path,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
    json: Option<PathBuf>,
) -> anyhow::Result<()> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Cannot read {}", input.display()))?;
    let state = AppState::new(config).context("Failed to set up sources")?;
    let cancel = cancel_on_ctrl_c();

    let run = verify_bibliography(&state.cascade, &state.config, &content, cancel, print_progress).await?;

    let output = output.unwrap_or_else(|| default_output(input));
    fs::write(&output, run.bibtex())
        .with_context(|| format!("Cannot write {}", output.display()))?;
    info!(path = %output.display(), "corrected bibliography written");

    if let Some(path) = report {
        let file = fs::File::create(&path)
            .with_context(|| format!("Cannot create {}", path.display()))?;
        write_csv(&report_rows(&run.report.outcomes), file)?;
        info!(path = %path.display(), "CSV report written");
    }

    if let Some(path) = json {
        fs::write(&path, export_json(&run.report.outcomes, &run.report.stats)?)
            .with_context(|| format!("Cannot write {}", path.display()))?;
        info!(path = %path.display(), "JSON export written");
    }

    let stats = &run.report.stats;
    println!();
    if run.report.cancelled {
        println!("Cancelled: {} of {} citations checked.", stats.processed, stats.total);
    }
    println!(
        "Verified: {}  Ambiguous: {}  Hallucination?: {}  Not found: {}  Skipped: {}",
        stats.verified, stats.ambiguous, stats.hallucinated, stats.not_found, stats.skipped
    );
    println!(
        "Checked {} citations in {} ({:.1}/min). Corrected file: {}",
        stats.processed,
        refclean::models::format_duration(stats.elapsed),
        stats.throughput,
        output.display()
    );
    Ok(())
}

// ============================================================================
// Text Flow
// ============================================================================

async fn run_text(config: Config, input: &Path, report: Option<PathBuf>) -> anyhow::Result<()> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Cannot read {}", input.display()))?;
    let state = AppState::new(config).context("Failed to set up sources")?;
    let cancel = cancel_on_ctrl_c();

    let result = verify_document(&state.cascade, &state.config, &content, cancel, print_progress).await?;
    let text = render_text_report(&result.lines);

    match report {
        Some(path) => {
            fs::write(&path, &text).with_context(|| format!("Cannot write {}", path.display()))?;
            info!(path = %path.display(), "validation report written");
        }
        None => print!("{}", text),
    }

    if result.cancelled {
        eprintln!(
            "Cancelled: {} of {} lines checked.",
            result.stats.processed, result.stats.total
        );
    }
    Ok(())
}

// ============================================================================
// Server
// ============================================================================

async fn serve(config: Config, bind: Option<String>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let state = Arc::new(AppState::new(config).context("Failed to set up sources")?);
    let app = handlers::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;

    println!("refclean API running at http://{}", bind);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
