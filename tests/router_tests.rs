//! Hybrid search router tests - partial failure, timeouts, circuit breaking
//!
//! The router's contract: always return within the decision deadline, degrade
//! to partial results on store failure, and never surface an error upward.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use smriti_context::engine::router::HybridSearchRouter;
use smriti_context::engine::types::{
    Memory, MemoryId, RoutingClass, SearchResult, StrategyDecision, StrategyDepth,
};
use smriti_context::stores::mem::{InMemoryRelationalStore, InMemoryVectorStore};
use smriti_context::stores::{CircuitBreakerConfig, Store, StoreAdapter, StoreKind};

// ============================================================================
// TEST DOUBLES
// ============================================================================

/// A store that always fails, counting how often it is actually called
struct FailingStore {
    kind: StoreKind,
    calls: AtomicUsize,
}

impl FailingStore {
    fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn search(
        &self,
        _user_id: &str,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("store unreachable"))
    }

    async fn upsert(&self, _memory: &Memory) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("store unreachable"))
    }

    async fn get(&self, _user_id: &str, _memory_id: &MemoryId) -> Result<Option<Memory>> {
        Err(anyhow!("store unreachable"))
    }

    fn kind(&self) -> StoreKind {
        self.kind
    }
}

/// A store that sleeps past any per-store budget before answering
struct SlowStore {
    kind: StoreKind,
    delay: Duration,
}

#[async_trait]
impl Store for SlowStore {
    async fn search(
        &self,
        _user_id: &str,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<SearchResult>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn upsert(&self, _memory: &Memory) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn get(&self, _user_id: &str, _memory_id: &MemoryId) -> Result<Option<Memory>> {
        Ok(None)
    }

    fn kind(&self) -> StoreKind {
        self.kind
    }
}

fn adapter(store: Arc<dyn Store>, timeout_ms: u64) -> Arc<StoreAdapter> {
    Arc::new(StoreAdapter::new(
        store,
        Duration::from_millis(timeout_ms),
        CircuitBreakerConfig::default(),
    ))
}

fn adapter_with_breaker(
    store: Arc<dyn Store>,
    timeout_ms: u64,
    breaker: CircuitBreakerConfig,
) -> Arc<StoreAdapter> {
    Arc::new(StoreAdapter::new(
        store,
        Duration::from_millis(timeout_ms),
        breaker,
    ))
}

fn decision(queries: Vec<&str>, deadline_ms: u64) -> StrategyDecision {
    StrategyDecision {
        depth: StrategyDepth::Deep,
        queries: queries.into_iter().map(String::from).collect(),
        routing: RoutingClass::Complex,
        use_vector: true,
        use_graph: true,
        use_relational: true,
        per_store_limit: 25,
        deadline: Duration::from_millis(deadline_ms),
    }
}

fn default_priority() -> Vec<StoreKind> {
    vec![StoreKind::Relational, StoreKind::Vector, StoreKind::Graph]
}

async fn seed_relational(store: &InMemoryRelationalStore, user: &str, content: &str) {
    store
        .upsert(&Memory::new(user, content, content))
        .await
        .unwrap();
}

// ============================================================================
// PARTIAL FAILURE
// ============================================================================

#[tokio::test]
async fn test_graph_unreachable_still_returns_other_stores_results() {
    let relational = Arc::new(InMemoryRelationalStore::new());
    seed_relational(&relational, "alice", "My dog's name is Biscuit").await;

    let vector = Arc::new(InMemoryVectorStore::new());
    vector
        .upsert(&Memory::new(
            "alice",
            "Biscuit is a golden retriever",
            "Biscuit is a golden retriever",
        ))
        .await
        .unwrap();

    let graph = Arc::new(FailingStore::new(StoreKind::Graph));

    let router = HybridSearchRouter::new(
        adapter(vector, 1000),
        adapter(graph.clone(), 1000),
        adapter(relational, 1000),
        default_priority(),
    );

    let results = router
        .execute("alice", &decision(vec!["dog name Biscuit"], 3000))
        .await;

    assert!(!results.is_empty(), "vector/relational results must survive");
    assert!(graph.calls() > 0, "graph was attempted");
    assert!(results
        .iter()
        .all(|r| r.source_store != StoreKind::Graph));
}

#[tokio::test]
async fn test_all_stores_failing_returns_empty_not_error() {
    let router = HybridSearchRouter::new(
        adapter(Arc::new(FailingStore::new(StoreKind::Vector)), 1000),
        adapter(Arc::new(FailingStore::new(StoreKind::Graph)), 1000),
        adapter(Arc::new(FailingStore::new(StoreKind::Relational)), 1000),
        default_priority(),
    );

    // No panic, no Err - just an empty set
    let results = router
        .execute("alice", &decision(vec!["anything", "at all"], 2000))
        .await;
    assert!(results.is_empty());
}

// ============================================================================
// PER-STORE TIMEOUTS
// ============================================================================

#[tokio::test]
async fn test_slow_store_is_excluded_within_overall_deadline() {
    let relational = Arc::new(InMemoryRelationalStore::new());
    seed_relational(&relational, "alice", "Biscuit chews everything").await;

    let slow_vector = Arc::new(SlowStore {
        kind: StoreKind::Vector,
        delay: Duration::from_secs(30),
    });
    let slow_graph = Arc::new(SlowStore {
        kind: StoreKind::Graph,
        delay: Duration::from_secs(30),
    });

    let router = HybridSearchRouter::new(
        adapter(slow_vector, 50),
        adapter(slow_graph, 50),
        adapter(relational, 500),
        default_priority(),
    );

    let start = Instant::now();
    let results = router
        .execute("alice", &decision(vec!["Biscuit"], 2000))
        .await;

    assert!(
        start.elapsed() < Duration::from_secs(2),
        "deadline must hold, took {:?}",
        start.elapsed()
    );
    assert!(!results.is_empty());
    assert!(results
        .iter()
        .all(|r| r.source_store == StoreKind::Relational));
}

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

#[tokio::test]
async fn test_breaker_short_circuits_graph_after_consecutive_failures() {
    let graph = Arc::new(FailingStore::new(StoreKind::Graph));
    let breaker = CircuitBreakerConfig {
        failure_threshold: 3,
        success_threshold: 1,
        open_duration: Duration::from_secs(60),
    };

    let graph_only = StrategyDecision {
        use_vector: false,
        use_relational: false,
        ..decision(vec!["q"], 1000)
    };

    let router = HybridSearchRouter::new(
        adapter(Arc::new(InMemoryVectorStore::new()), 1000),
        adapter_with_breaker(graph.clone(), 1000, breaker),
        adapter(Arc::new(InMemoryRelationalStore::new()), 1000),
        default_priority(),
    );

    // Three failures trip the breaker
    for _ in 0..3 {
        router.execute("alice", &graph_only).await;
    }
    assert_eq!(graph.calls(), 3);

    // Cool-down has not elapsed: subsequent requests skip the graph entirely
    for _ in 0..5 {
        router.execute("alice", &graph_only).await;
    }
    assert_eq!(
        graph.calls(),
        3,
        "open breaker must not dispatch to the graph store"
    );
}

// ============================================================================
// MERGING ACROSS QUERIES
// ============================================================================

#[tokio::test]
async fn test_results_deduplicated_across_queries() {
    let relational = Arc::new(InMemoryRelationalStore::new());
    seed_relational(&relational, "alice", "Biscuit is my dog").await;

    let router = HybridSearchRouter::new(
        adapter(Arc::new(InMemoryVectorStore::new()), 1000),
        adapter(Arc::new(FailingStore::new(StoreKind::Graph)), 1000),
        adapter(relational, 1000),
        default_priority(),
    );

    // Two queries hit the same record; the merged output carries it once
    let results = router
        .execute("alice", &decision(vec!["Biscuit dog", "my dog Biscuit"], 3000))
        .await;

    let ids: Vec<_> = results.iter().map(|r| r.memory_id.clone()).collect();
    let mut deduped = ids.clone();
    deduped.sort_by_key(|id| id.to_string());
    deduped.dedup();
    assert_eq!(ids.len(), deduped.len(), "no duplicate memory ids in output");
    assert!(!results.is_empty());
}
