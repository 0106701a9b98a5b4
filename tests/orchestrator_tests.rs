//! Orchestrator integration tests - the dual-path execution contract
//!
//! These tests exercise the full engine against real in-memory stores with
//! call counting, and a deterministic stub reasoner so nothing here depends
//! on a live model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use smriti_context::config::EngineConfig;
use smriti_context::engine::types::{Memory, MemoryId, MemorySource, SearchResult};
use smriti_context::engine::Orchestrator;
use smriti_context::reasoner::StaticReasoner;
use smriti_context::stores::mem::{
    InMemoryGraphStore, InMemoryRelationalStore, InMemoryVectorStore,
};
use smriti_context::stores::{Store, StoreKind};

const SKIP_JSON: &str = r#"{"remember":false,"content":"","priority":"low"}"#;
const REMEMBER_DARK_MODE_JSON: &str =
    r#"{"remember":true,"content":"User prefers dark mode","priority":"normal"}"#;

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// Wraps a real store and counts calls
struct CountingStore<S: Store> {
    inner: S,
    search_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
}

impl<S: Store> CountingStore<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            search_calls: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
        }
    }

    fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: Store> Store for CountingStore<S> {
    async fn search(&self, user_id: &str, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search(user_id, query, limit).await
    }

    async fn upsert(&self, memory: &Memory) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(memory).await
    }

    async fn get(&self, user_id: &str, memory_id: &MemoryId) -> Result<Option<Memory>> {
        self.inner.get(user_id, memory_id).await
    }

    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }
}

/// A store whose every call hangs far past any sane budget
struct HangingStore {
    kind: StoreKind,
}

#[async_trait]
impl Store for HangingStore {
    async fn search(
        &self,
        _user_id: &str,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<SearchResult>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }

    async fn upsert(&self, _memory: &Memory) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    async fn get(&self, _user_id: &str, _memory_id: &MemoryId) -> Result<Option<Memory>> {
        Ok(None)
    }

    fn kind(&self) -> StoreKind {
        self.kind
    }
}

type Counting<S> = Arc<CountingStore<S>>;

struct Harness {
    orchestrator: Orchestrator,
    vector: Counting<InMemoryVectorStore>,
    graph: Counting<InMemoryGraphStore>,
    relational: Counting<InMemoryRelationalStore>,
}

fn harness(reasoner_response: &str) -> Harness {
    let vector = Arc::new(CountingStore::new(InMemoryVectorStore::new()));
    let graph = Arc::new(CountingStore::new(InMemoryGraphStore::new()));
    let relational = Arc::new(CountingStore::new(InMemoryRelationalStore::new()));

    let orchestrator = Orchestrator::new(
        vector.clone(),
        graph.clone(),
        relational.clone(),
        Arc::new(StaticReasoner::new(reasoner_response)),
        EngineConfig::default(),
    );

    Harness {
        orchestrator,
        vector,
        graph,
        relational,
    }
}

/// Poll until `predicate` holds or the deadline passes
async fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    predicate()
}

async fn seed(h: &Harness, user: &str, content: &str) {
    let mut memory = Memory::new(user, content, content);
    memory.source = MemorySource::Explicit;
    h.orchestrator
        .pipeline()
        .write(memory)
        .await
        .expect("seed write failed")
        .expect("seed write deduplicated unexpectedly");
}

// ============================================================================
// FAST SHORT-CIRCUIT
// ============================================================================

#[tokio::test]
async fn test_needs_context_false_makes_zero_store_searches() {
    let h = harness(SKIP_JSON);

    let result = h
        .orchestrator
        .process_message("alice", "just thinking out loud here", false, false)
        .await
        .unwrap();

    assert_eq!(result.strategy_used, "none");
    assert_eq!(result.context_text, "");

    // Background triage (skip decision) settles without touching any store
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.vector.searches(), 0);
    assert_eq!(h.graph.searches(), 0);
    assert_eq!(h.relational.searches(), 0);
    assert_eq!(h.relational.upserts(), 0);
}

// ============================================================================
// LATENCY BOUND
// ============================================================================

#[tokio::test]
async fn test_fast_path_returns_within_deadline_despite_hung_stores() {
    let config = EngineConfig {
        vector_timeout: Duration::from_millis(50),
        relational_timeout: Duration::from_millis(50),
        graph_timeout: Duration::from_millis(50),
        relevant_deadline: Duration::from_millis(300),
        ..Default::default()
    };

    let orchestrator = Orchestrator::new(
        Arc::new(HangingStore {
            kind: StoreKind::Vector,
        }),
        Arc::new(HangingStore {
            kind: StoreKind::Graph,
        }),
        Arc::new(HangingStore {
            kind: StoreKind::Relational,
        }),
        Arc::new(StaticReasoner::new(SKIP_JSON)),
        config,
    );

    let start = Instant::now();
    let result = orchestrator
        .process_message("alice", "What's my favorite color?", false, true)
        .await
        .unwrap();

    // Every store hangs for 60s; per-store budgets cut them off and the
    // response degrades to empty context instead of failing or stalling.
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "fast path took {:?}",
        start.elapsed()
    );
    assert_eq!(result.strategy_used, "relevant");
    assert_eq!(result.context_text, "");
}

// ============================================================================
// SCENARIO: FACTUAL QUERY ROUTES TO RELATIONAL ONLY
// ============================================================================

#[tokio::test]
async fn test_factual_query_consults_relational_store_only() {
    let h = harness(SKIP_JSON);
    seed(&h, "alice", "My dog's name is Biscuit").await;

    let start = Instant::now();
    let result = h
        .orchestrator
        .process_message("alice", "What's my dog's name?", false, true)
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(result.strategy_used, "relevant");
    assert!(result.context_text.contains("Biscuit"));

    assert!(h.relational.searches() > 0, "relational store must be queried");
    assert_eq!(h.vector.searches(), 0, "vector store must not be queried");
    assert_eq!(h.graph.searches(), 0, "graph store must not be queried");
}

// ============================================================================
// SCENARIO: COLD NEW CONVERSATION
// ============================================================================

#[tokio::test]
async fn test_cold_new_conversation_goes_deep_and_populates_narrative() {
    let h = harness(SKIP_JSON);
    seed(&h, "alice", "Alice works on distributed systems at Corvid Labs").await;
    seed(&h, "alice", "Alice prefers dark mode everywhere").await;

    let result = h
        .orchestrator
        .process_message(
            "alice",
            "hey, how are things over at Corvid Labs these days",
            true,
            true,
        )
        .await
        .unwrap();

    assert_eq!(result.strategy_used, "deep");
    assert!(h.relational.searches() > 0);
    assert!(h.vector.searches() > 0);
    assert!(h.graph.searches() > 0);

    // The background path synthesizes and caches the narrative afterwards
    let populated = wait_until(Duration::from_secs(3), || {
        h.orchestrator.narrative().get("alice").is_some()
    })
    .await;
    assert!(populated, "narrative cache should be populated by background path");
}

// ============================================================================
// CACHE PROPERTY: WARM NARRATIVE SERVES WITHOUT STORE ACCESS
// ============================================================================

#[tokio::test]
async fn test_warm_narrative_serves_with_zero_store_searches() {
    let h = harness(SKIP_JSON);
    h.orchestrator.narrative().put(
        "alice",
        "Alice is a Rust developer who prefers dark mode.".to_string(),
        Duration::from_secs(60),
    );

    let result = h
        .orchestrator
        .process_message("alice", "good morning!", true, true)
        .await
        .unwrap();

    assert_eq!(result.strategy_used, "narrative");
    assert!(result.context_text.contains("dark mode"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.vector.searches(), 0);
    assert_eq!(h.graph.searches(), 0);
    assert_eq!(h.relational.searches(), 0);
}

// ============================================================================
// SCENARIO: REMEMBER + DEDUP
// ============================================================================

#[tokio::test]
async fn test_memorable_message_written_once_across_repeats() {
    let h = harness(REMEMBER_DARK_MODE_JSON);

    h.orchestrator
        .process_message("alice", "Remember that I prefer dark mode", false, false)
        .await
        .unwrap();

    // Background path: triage -> write to all three stores
    let written = wait_until(Duration::from_secs(3), || {
        h.relational.inner.count("alice") == 1
    })
    .await;
    assert!(written, "memory should be durably written");
    assert!(h.vector.upserts() >= 1);
    assert!(h.graph.upserts() >= 1);

    // An identical repeat deduplicates: no second record
    h.orchestrator
        .process_message("alice", "Remember that I prefer dark mode", false, false)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(
        h.relational.inner.count("alice"),
        1,
        "duplicate content must not create a second record"
    );
}

// ============================================================================
// VALIDATION
// ============================================================================

#[tokio::test]
async fn test_invalid_user_id_is_rejected() {
    let h = harness(SKIP_JSON);

    let err = h
        .orchestrator
        .process_message("not/a/valid/user", "hello", false, true)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVALID_INPUT");
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let h = harness(SKIP_JSON);

    let err = h
        .orchestrator
        .process_message("alice", "   ", false, true)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVALID_INPUT");
}

// ============================================================================
// NARRATIVE INVALIDATION ACROSS THE TWO PATHS
// ============================================================================

#[tokio::test]
async fn test_accepted_write_invalidates_warm_narrative() {
    let h = harness(REMEMBER_DARK_MODE_JSON);
    h.orchestrator.narrative().put(
        "alice",
        "stale narrative".to_string(),
        Duration::from_secs(60),
    );

    h.orchestrator
        .process_message("alice", "Remember that I prefer dark mode", false, false)
        .await
        .unwrap();

    let invalidated = wait_until(Duration::from_secs(3), || {
        h.orchestrator.narrative().get("alice").is_none()
    })
    .await;
    assert!(
        invalidated,
        "durable write must invalidate the user's narrative"
    );
}
