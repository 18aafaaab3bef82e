//! Tests for cascade ordering and the circuit breaker.

use super::*;
use crate::test_support::{calls, candidate, FakeSource};

fn hit(source: SourceTag, title: &str) -> CandidateRecord {
    candidate(source, title, Some(2020), &["A Author"], None)
}

// ============================================================================
// CascadeState
// ============================================================================

#[test]
fn test_breaker_trips_at_threshold() {
    let mut state = CascadeState::new(3);
    assert!(!state.record_failure());
    assert!(!state.record_failure());
    assert!(state.record_failure());
    assert!(state.blocked);
    // Stays blocked, never reported as tripping twice
    assert!(!state.record_failure());
    state.record_success();
    assert!(state.blocked);
}

#[test]
fn test_breaker_counts_consecutive_misses_only() {
    let mut state = CascadeState::new(3);
    state.record_failure();
    state.record_failure();
    state.record_success();
    assert_eq!(state.consecutive_failures, 0);
    state.record_failure();
    state.record_failure();
    assert!(!state.blocked);
}

#[test]
fn test_zero_threshold_is_clamped() {
    let mut state = CascadeState::new(0);
    assert_eq!(state.threshold(), 1);
    assert!(state.record_failure());
}

// ============================================================================
// Cascade
// ============================================================================

#[tokio::test]
async fn test_first_hit_short_circuits() {
    // Even a poor hit from the first source wins
    let a = FakeSource::new(SourceTag::GoogleScholar)
        .guarded()
        .always(hit(SourceTag::GoogleScholar, "Completely Unrelated Paper"));
    let b = FakeSource::new(SourceTag::SemanticScholar).always(hit(SourceTag::SemanticScholar, "Deep Learning"));
    let c = FakeSource::new(SourceTag::Crossref).always(hit(SourceTag::Crossref, "Deep Learning"));
    let (ca, cb, cc) = (a.counter(), b.counter(), c.counter());

    let cascade = Cascade::new(vec![Box::new(a), Box::new(b), Box::new(c)]);
    let mut state = CascadeState::default();
    let found = cascade.resolve("Deep Learning", &mut state).await.unwrap();

    assert_eq!(found.source, SourceTag::GoogleScholar);
    assert_eq!(found.title, "Completely Unrelated Paper");
    assert_eq!((calls(&ca), calls(&cb), calls(&cc)), (1, 0, 0));
}

#[tokio::test]
async fn test_falls_through_in_priority_order() {
    let a = FakeSource::new(SourceTag::GoogleScholar).guarded();
    let b = FakeSource::new(SourceTag::SemanticScholar);
    let c = FakeSource::new(SourceTag::Crossref).always(hit(SourceTag::Crossref, "Deep Learning"));
    let (ca, cb, cc) = (a.counter(), b.counter(), c.counter());

    let cascade = Cascade::new(vec![Box::new(a), Box::new(b), Box::new(c)]);
    let mut state = CascadeState::default();
    let found = cascade.resolve("Deep Learning", &mut state).await.unwrap();

    assert_eq!(found.source, SourceTag::Crossref);
    assert_eq!((calls(&ca), calls(&cb), calls(&cc)), (1, 1, 1));
    assert_eq!(state.consecutive_failures, 1);
}

#[tokio::test]
async fn test_all_sources_miss() {
    let cascade = Cascade::new(vec![
        Box::new(FakeSource::new(SourceTag::GoogleScholar).guarded()),
        Box::new(FakeSource::new(SourceTag::SemanticScholar)),
        Box::new(FakeSource::new(SourceTag::Crossref)),
    ]);
    let mut state = CascadeState::default();
    assert!(cascade
        .resolve("Quantum Neural Networks for Time Travel", &mut state)
        .await
        .is_none());
}

#[tokio::test]
async fn test_blocked_source_gets_no_more_calls() {
    let a = FakeSource::new(SourceTag::GoogleScholar).guarded();
    let b = FakeSource::new(SourceTag::SemanticScholar).always(hit(SourceTag::SemanticScholar, "X"));
    let (ca, cb) = (a.counter(), b.counter());

    let cascade = Cascade::new(vec![Box::new(a), Box::new(b)]);
    let mut state = CascadeState::new(3);

    for _ in 0..3 {
        assert!(cascade.resolve("some title", &mut state).await.is_some());
    }
    assert!(state.blocked);
    assert_eq!(calls(&ca), 3);

    for _ in 0..5 {
        assert!(cascade.resolve("another title", &mut state).await.is_some());
    }
    assert_eq!(calls(&ca), 3);
    assert_eq!(calls(&cb), 8);
}

#[tokio::test]
async fn test_unguarded_misses_do_not_touch_breaker() {
    let cascade = Cascade::new(vec![
        Box::new(FakeSource::new(SourceTag::SemanticScholar)),
        Box::new(FakeSource::new(SourceTag::Crossref)),
    ]);
    let mut state = CascadeState::new(1);
    for _ in 0..4 {
        cascade.resolve("nothing", &mut state).await;
    }
    assert_eq!(state, CascadeState::new(1));
}

#[tokio::test]
async fn test_fresh_state_unblocks_next_run() {
    let a = FakeSource::new(SourceTag::GoogleScholar).guarded();
    let ca = a.counter();
    let cascade = Cascade::new(vec![Box::new(a)]);

    let mut run1 = CascadeState::new(1);
    cascade.resolve("t", &mut run1).await;
    cascade.resolve("t", &mut run1).await;
    assert_eq!(calls(&ca), 1);

    let mut run2 = CascadeState::new(1);
    cascade.resolve("t", &mut run2).await;
    assert_eq!(calls(&ca), 2);
}

#[test]
fn test_sources_listed_in_order() {
    let cascade = Cascade::new(vec![
        Box::new(FakeSource::new(SourceTag::Crossref)),
        Box::new(FakeSource::new(SourceTag::GoogleScholar)),
    ]);
    let order: Vec<_> = cascade.sources().collect();
    assert_eq!(order, vec![SourceTag::Crossref, SourceTag::GoogleScholar]);
    assert!(!cascade.is_empty());
}
