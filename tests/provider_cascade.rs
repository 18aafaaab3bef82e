//! End-to-end runs of the real HTTP source adapters against a local server
//! that serves canned provider payloads.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use refclean::cascade::{Cascade, CascadeState};
use refclean::config::Config;
use refclean::sources::build_sources;
use refclean::{verify_bibliography, SourceTag, VerificationStatus};

const SCHOLAR_PAGE: &str = r#"
<div class="gs_r gs_or gs_scl">
  <div class="gs_ri">
    <h3 class="gs_rt"><a href="https://proceedings.neurips.cc/paper/7181">Attention is all you need</a></h3>
    <div class="gs_a">A Vaswani, N Shazeer - Advances in neural information processing systems, 2017 - neurips.cc</div>
  </div>
</div>
"#;

#[derive(Clone, Default)]
struct Hits {
    scholar: Arc<AtomicUsize>,
    semantic: Arc<AtomicUsize>,
    crossref: Arc<AtomicUsize>,
}

async fn scholar(State(hits): State<Hits>, Query(q): Query<HashMap<String, String>>) -> Response {
    hits.scholar.fetch_add(1, Ordering::SeqCst);
    match q.get("q").map(String::as_str) {
        Some("Attention Is All You Need") => Html(SCHOLAR_PAGE).into_response(),
        _ => (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response(),
    }
}

async fn semantic_scholar(
    State(hits): State<Hits>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    hits.semantic.fetch_add(1, Ordering::SeqCst);
    match q.get("query").map(String::as_str) {
        Some("Deep Learning") => Json(json!({
            "total": 1,
            "data": [{
                "paperId": "abc",
                "title": "Deep Learning",
                "year": 2016,
                "venue": "",
                "authors": [
                    {"authorId": "1", "name": "Ian Goodfellow"},
                    {"authorId": "2", "name": "Yoshua Bengio"}
                ]
            }]
        }))
        .into_response(),
        Some("Broken Payload Example") => "<html>not json</html>".into_response(),
        _ => Json(json!({"total": 0, "data": []})).into_response(),
    }
}

async fn crossref(State(hits): State<Hits>, Query(q): Query<HashMap<String, String>>) -> Response {
    hits.crossref.fetch_add(1, Ordering::SeqCst);
    match q.get("query.bibliographic").map(String::as_str) {
        Some("Neural Ordinary Differential Equations") => Json(json!({
            "status": "ok",
            "message": {
                "items": [{
                    "title": ["Neural Ordinary Differential Equations"],
                    "author": [{"given": "Ricky T. Q.", "family": "Chen"}],
                    "created": {"date-parts": [[2018, 6, 19]]},
                    "container-title": ["Advances in Neural Information Processing Systems"]
                }]
            }
        }))
        .into_response(),
        Some("Server Error Example") => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => Json(json!({"status": "ok", "message": {"items": []}})).into_response(),
    }
}

async fn spawn_providers() -> (Config, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/scholar", get(scholar))
        .route("/graph/v1/paper/search", get(semantic_scholar))
        .route("/works", get(crossref))
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base = format!("http://{}", addr);
    let mut config = Config::default();
    config.sources.google_scholar_url = base.clone();
    config.sources.semantic_scholar_url = base.clone();
    config.sources.crossref_url = format!("{}/", base);
    config.sources.scholar_delay_min_ms = 0;
    config.sources.scholar_delay_max_ms = 0;
    config.sources.api_delay_ms = 0;
    (config, hits)
}

const BIB: &str = r#"
@inproceedings{vaswani2017,
  title = {Attention Is All You Need},
  year = {2017},
}

@book{goodfellow2016,
  title = {{Deep} Learning},
  year = {2015},
  publisher = {MIT Press},
}

@inproceedings{chen2018,
  title = {Neural Ordinary Differential Equations},
}

@article{made_up_1,
  title = {Quantum Gradient Descent for Time Travel},
  author = {Nobody, A.},
}

@article{made_up_2,
  title = {Another Completely Invented Title},
}
"#;

#[tokio::test]
async fn test_bibliography_run_over_http() {
    let (config, hits) = spawn_providers().await;
    let cascade = Cascade::new(build_sources(&config).unwrap());

    let run = verify_bibliography(&cascade, &config, BIB, CancellationToken::new(), |_| {})
        .await
        .unwrap();
    let outcomes = &run.report.outcomes;

    let summary: Vec<_> = outcomes.iter().map(|o| (o.status, o.source)).collect();
    assert_eq!(
        summary,
        vec![
            (VerificationStatus::Verified, Some(SourceTag::GoogleScholar)),
            (VerificationStatus::Verified, Some(SourceTag::SemanticScholar)),
            (VerificationStatus::Verified, Some(SourceTag::Crossref)),
            (VerificationStatus::NotFound, None),
            (VerificationStatus::NotFound, None),
        ]
    );

    // Three consecutive rate-limited scrapes trip the breaker; the last
    // citation goes straight to the API sources.
    assert_eq!(hits.scholar.load(Ordering::SeqCst), 4);
    assert_eq!(hits.semantic.load(Ordering::SeqCst), 4);
    assert_eq!(hits.crossref.load(Ordering::SeqCst), 3);

    let dl = &run.bib.entries[1];
    assert_eq!(dl.get("title"), Some("Deep Learning"));
    assert_eq!(dl.get("year"), Some("2016"));
    assert_eq!(dl.get("author"), Some("Ian Goodfellow and Yoshua Bengio"));
    assert_eq!(dl.get("publisher"), Some("MIT Press"));
    assert_eq!(dl.get("note"), Some("Verified by Semantic Scholar"));

    let ode = &run.bib.entries[2];
    assert_eq!(ode.get("year"), Some("2018"));
    assert_eq!(ode.get("author"), Some("Ricky T. Q. Chen"));
    assert_eq!(
        ode.get("journal"),
        Some("Advances in Neural Information Processing Systems")
    );

    let fake = &run.bib.entries[3];
    assert_eq!(fake.get("author"), Some("Nobody, A."));
    assert_eq!(fake.get("note"), Some("Not Found in any DB"));
}

#[tokio::test]
async fn test_provider_failures_fall_through() {
    let (mut config, hits) = spawn_providers().await;
    config.sources.order = vec!["semantic_scholar".to_string(), "crossref".to_string()];
    let cascade = Cascade::new(build_sources(&config).unwrap());
    let mut state = CascadeState::default();

    assert!(cascade.resolve("Broken Payload Example", &mut state).await.is_none());
    assert!(cascade.resolve("Server Error Example", &mut state).await.is_none());
    assert_eq!(hits.semantic.load(Ordering::SeqCst), 2);
    assert_eq!(hits.crossref.load(Ordering::SeqCst), 2);
    assert_eq!(hits.scholar.load(Ordering::SeqCst), 0);

    // No guarded source in this cascade, so nothing counts towards the breaker
    assert_eq!(state.consecutive_failures, 0);
    assert!(!state.blocked);
}

#[tokio::test]
async fn test_unreachable_provider_is_a_miss() {
    let mut config = Config::default();
    // Port 9 (discard) on localhost is not expected to accept HTTP
    config.sources.order = vec!["crossref".to_string()];
    config.sources.crossref_url = "http://127.0.0.1:9".to_string();
    config.sources.api_delay_ms = 0;
    config.sources.http_timeout_secs = 2;
    let cascade = Cascade::new(build_sources(&config).unwrap());

    let mut state = CascadeState::default();
    assert!(cascade.resolve("Deep Learning", &mut state).await.is_none());
}
