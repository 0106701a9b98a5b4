//! Hybrid search fan-out across the three stores
//!
//! Executes a `StrategyDecision`: one task per (query, applicable store),
//! each bounded by its adapter's per-store budget, collected with a
//! select-style fan-in under the decision's overall deadline. A store that
//! times out or errors is excluded from that query's results; if every store
//! fails for a query the router logs and returns an empty set for it. The
//! caller always gets *something*.
//!
//! Merging: results are deduplicated by memory id and ranked by
//! (store priority, score) with recency as the tiebreak. No cross-store
//! score normalization - relational lookups are exact and cheapest, so the
//! default priority is relational > vector > graph.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::types::{MemoryId, SearchResult, StrategyDecision};
use crate::stores::{CircuitState, StoreAdapter, StoreKind};

pub struct HybridSearchRouter {
    vector: Arc<StoreAdapter>,
    graph: Arc<StoreAdapter>,
    relational: Arc<StoreAdapter>,
    /// Ranking priority, highest first
    store_priority: Vec<StoreKind>,
}

impl HybridSearchRouter {
    pub fn new(
        vector: Arc<StoreAdapter>,
        graph: Arc<StoreAdapter>,
        relational: Arc<StoreAdapter>,
        store_priority: Vec<StoreKind>,
    ) -> Self {
        Self {
            vector,
            graph,
            relational,
            store_priority,
        }
    }

    /// Current breaker state per store, for readiness reporting
    pub fn circuit_states(&self) -> Vec<(StoreKind, CircuitState)> {
        vec![
            (StoreKind::Relational, self.relational.circuit_state()),
            (StoreKind::Vector, self.vector.circuit_state()),
            (StoreKind::Graph, self.graph.circuit_state()),
        ]
    }

    fn adapters_for(&self, decision: &StrategyDecision) -> Vec<Arc<StoreAdapter>> {
        let mut adapters = Vec::new();
        if decision.use_relational {
            adapters.push(self.relational.clone());
        }
        if decision.use_vector {
            adapters.push(self.vector.clone());
        }
        if decision.use_graph {
            adapters.push(self.graph.clone());
        }
        adapters
    }

    /// Execute the decision, always returning within `decision.deadline`.
    pub async fn execute(&self, user_id: &str, decision: &StrategyDecision) -> Vec<SearchResult> {
        let adapters = self.adapters_for(decision);
        if adapters.is_empty() || decision.queries.is_empty() {
            return Vec::new();
        }

        let task_count = decision.queries.len() * adapters.len();
        let (tx, mut rx) = mpsc::channel(task_count);

        for (query_idx, query) in decision.queries.iter().enumerate() {
            for adapter in &adapters {
                let tx = tx.clone();
                let adapter = adapter.clone();
                let user = user_id.to_string();
                let query = query.clone();
                let limit = decision.per_store_limit;

                tokio::spawn(async move {
                    let outcome = adapter.search(&user, &query, limit).await;
                    // Receiver may already have hit the deadline; that's fine
                    let _ = tx.send((query_idx, adapter.kind(), outcome)).await;
                });
            }
        }
        drop(tx);

        let deadline = tokio::time::Instant::now() + decision.deadline;
        let query_count = decision.queries.len();
        let mut per_query_hits: Vec<usize> = vec![0; query_count];
        let mut per_query_failures: Vec<usize> = vec![0; query_count];
        let mut collected: Vec<SearchResult> = Vec::new();
        let mut received = 0usize;

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some((query_idx, kind, Ok(results))) => {
                        received += 1;
                        per_query_hits[query_idx] += results.len();
                        collected.extend(results);
                        debug!(store = %kind, query_idx, "store search completed");
                        if received == task_count {
                            break;
                        }
                    }
                    Some((query_idx, kind, Err(e))) => {
                        received += 1;
                        per_query_failures[query_idx] += 1;
                        debug!(store = %kind, query_idx, "store excluded from results: {}", e);
                        if received == task_count {
                            break;
                        }
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        "Router deadline {:?} reached with {}/{} store calls complete; returning partial results",
                        decision.deadline, received, task_count
                    );
                    break;
                }
            }
        }

        // Total failure for a query is logged, never propagated: the
        // orchestrator must always return something to the caller.
        for (query_idx, failures) in per_query_failures.iter().enumerate() {
            if *failures == adapters.len() && per_query_hits[query_idx] == 0 {
                warn!(
                    query = %decision.queries[query_idx],
                    "All stores failed for query; returning empty result set for it"
                );
            }
        }

        self.merge_and_rank(collected)
    }

    fn priority(&self, kind: StoreKind) -> usize {
        self.store_priority
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(self.store_priority.len())
    }

    /// Dedup by memory id, keeping the best-ranked hit, then order the whole
    /// set by (store priority, score desc, recency desc).
    fn merge_and_rank(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut best: HashMap<MemoryId, SearchResult> = HashMap::new();

        for result in results {
            match best.entry(result.memory_id.clone()) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    if self.ranks_higher(&result, entry.get()) {
                        entry.insert(result);
                    }
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(result);
                }
            }
        }

        let mut merged: Vec<SearchResult> = best.into_values().collect();
        merged.sort_by(|a, b| {
            self.priority(a.source_store)
                .cmp(&self.priority(b.source_store))
                .then_with(|| {
                    b.score
                        .partial_cmp(&a.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        merged
    }

    fn ranks_higher(&self, a: &SearchResult, b: &SearchResult) -> bool {
        let pa = self.priority(a.source_store);
        let pb = self.priority(b.source_store);
        if pa != pb {
            return pa < pb;
        }
        if (a.score - b.score).abs() > f32::EPSILON {
            return a.score > b.score;
        }
        a.created_at > b.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn router() -> HybridSearchRouter {
        use crate::stores::mem::{
            InMemoryGraphStore, InMemoryRelationalStore, InMemoryVectorStore,
        };
        use crate::stores::CircuitBreakerConfig;
        use std::time::Duration;

        HybridSearchRouter::new(
            Arc::new(StoreAdapter::new(
                Arc::new(InMemoryVectorStore::new()),
                Duration::from_secs(1),
                CircuitBreakerConfig::default(),
            )),
            Arc::new(StoreAdapter::new(
                Arc::new(InMemoryGraphStore::new()),
                Duration::from_secs(1),
                CircuitBreakerConfig::default(),
            )),
            Arc::new(StoreAdapter::new(
                Arc::new(InMemoryRelationalStore::new()),
                Duration::from_secs(1),
                CircuitBreakerConfig::default(),
            )),
            vec![StoreKind::Relational, StoreKind::Vector, StoreKind::Graph],
        )
    }

    fn result(store: StoreKind, score: f32, age_secs: i64) -> SearchResult {
        SearchResult {
            memory_id: MemoryId(Uuid::new_v4()),
            content: "content".to_string(),
            score,
            source_store: store,
            created_at: Utc::now() - ChronoDuration::seconds(age_secs),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_merge_orders_by_store_priority_first() {
        let router = router();
        let merged = router.merge_and_rank(vec![
            result(StoreKind::Graph, 0.99, 0),
            result(StoreKind::Relational, 0.2, 0),
            result(StoreKind::Vector, 0.9, 0),
        ]);

        assert_eq!(merged[0].source_store, StoreKind::Relational);
        assert_eq!(merged[1].source_store, StoreKind::Vector);
        assert_eq!(merged[2].source_store, StoreKind::Graph);
    }

    #[test]
    fn test_merge_orders_by_score_within_store() {
        let router = router();
        let merged = router.merge_and_rank(vec![
            result(StoreKind::Vector, 0.3, 0),
            result(StoreKind::Vector, 0.8, 0),
        ]);

        assert!(merged[0].score > merged[1].score);
    }

    #[test]
    fn test_merge_breaks_ties_by_recency() {
        let router = router();
        let older = result(StoreKind::Vector, 0.5, 3600);
        let newer = result(StoreKind::Vector, 0.5, 0);
        let older_id = older.memory_id.clone();
        let newer_id = newer.memory_id.clone();

        let merged = router.merge_and_rank(vec![older, newer]);
        assert_eq!(merged[0].memory_id, newer_id);
        assert_eq!(merged[1].memory_id, older_id);
    }

    #[test]
    fn test_merge_dedups_by_memory_id_keeping_higher_priority_store() {
        let router = router();
        let id = MemoryId(Uuid::new_v4());
        let mut from_graph = result(StoreKind::Graph, 0.9, 0);
        from_graph.memory_id = id.clone();
        let mut from_relational = result(StoreKind::Relational, 0.4, 0);
        from_relational.memory_id = id.clone();

        let merged = router.merge_and_rank(vec![from_graph, from_relational]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_store, StoreKind::Relational);
    }
}
