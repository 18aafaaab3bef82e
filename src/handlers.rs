//! HTTP route handlers for the verification API.
//!
//! Request bodies are the raw document text (BibTeX or a plain reference
//! list). Runs are serialized through `AppState::run_lock` and each request
//! starts with a fresh circuit breaker.

use crate::error::RefCleanError;
use crate::report::{render_text_report, report_rows};
use crate::{verify_bibliography, verify_document, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/verify/bib", post(verify_bib))
        .route("/api/verify/text", post(verify_text))
        .with_state(state)
}

// ============================================================================
// Health
// ============================================================================

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let sources: Vec<&str> = state.cascade.sources().map(|s| s.key()).collect();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sources": sources,
    }))
}

// ============================================================================
// Verification Handlers
// ============================================================================

fn error_response(err: RefCleanError) -> Response {
    match err {
        RefCleanError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        other => {
            warn!(error = %other, "verification run failed");
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
        }
    }
}

pub async fn verify_bib(State(state): State<Arc<AppState>>, body: String) -> Response {
    let _guard = state.run_lock.lock().await;
    info!(bytes = body.len(), "bibliography submitted");

    let run = match verify_bibliography(
        &state.cascade,
        &state.config,
        &body,
        CancellationToken::new(),
        |_| {},
    )
    .await
    {
        Ok(run) => run,
        Err(e) => return error_response(e),
    };

    Json(json!({
        "rows": report_rows(&run.report.outcomes),
        "outcomes": run.report.outcomes,
        "stats": run.report.stats,
        "bibtex": run.bibtex(),
    }))
    .into_response()
}

pub async fn verify_text(State(state): State<Arc<AppState>>, body: String) -> Response {
    let _guard = state.run_lock.lock().await;
    info!(bytes = body.len(), "document submitted");

    let report = match verify_document(
        &state.cascade,
        &state.config,
        &body,
        CancellationToken::new(),
        |_| {},
    )
    .await
    {
        Ok(report) => report,
        Err(e) => return error_response(e),
    };

    Json(json!({
        "report": render_text_report(&report.lines),
        "lines": report.lines,
        "stats": report.stats,
    }))
    .into_response()
}
