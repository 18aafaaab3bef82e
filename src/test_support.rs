use crate::models::{CandidateRecord, SourceTag};
use crate::sources::SourceAdapter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory source: answers from a fixed title -> candidate table.
pub struct FakeSource {
    pub tag: SourceTag,
    pub guarded: bool,
    /// Answer for every query, when set.
    pub always: Option<CandidateRecord>,
    pub by_query: HashMap<String, CandidateRecord>,
    pub calls: Arc<AtomicUsize>,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl FakeSource {
    pub fn new(tag: SourceTag) -> Self {
        Self {
            tag,
            guarded: false,
            always: None,
            by_query: HashMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn guarded(mut self) -> Self {
        self.guarded = true;
        self
    }

    pub fn always(mut self, candidate: CandidateRecord) -> Self {
        self.always = Some(candidate);
        self
    }

    pub fn answer(mut self, query: &str, candidate: CandidateRecord) -> Self {
        self.by_query.insert(query.to_string(), candidate);
        self
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub fn query_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.queries)
    }
}

#[async_trait]
impl SourceAdapter for FakeSource {
    fn tag(&self) -> SourceTag {
        self.tag
    }

    fn guarded(&self) -> bool {
        self.guarded
    }

    async fn search(&self, title: &str) -> Option<CandidateRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(title.to_string());
        self.by_query
            .get(title)
            .cloned()
            .or_else(|| self.always.clone())
    }
}

pub fn candidate(
    source: SourceTag,
    title: &str,
    year: Option<i32>,
    authors: &[&str],
    journal: Option<&str>,
) -> CandidateRecord {
    let authors: Vec<String> = authors.iter().map(|a| a.to_string()).collect();
    CandidateRecord::new(source, title, year, &authors, journal).unwrap()
}

pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
