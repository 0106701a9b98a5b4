//! Durable memory writes with dedup and partial-failure tracking
//!
//! Accepted memories fan out to all three stores concurrently. Each store
//! write is retried once on failure. The relational store is the source of
//! truth for existence: if its write ultimately fails the memory is not
//! accepted; vector/graph writes are best-effort - losing semantic
//! searchability is recoverable, losing the fact that a memory exists is not.
//!
//! Dedup is an in-process bounded LRU over content hashes. A cache miss does
//! not guarantee no duplicate exists (eventual consistency, accepted
//! trade-off); it prevents redundant writes within a session, including
//! concurrent submission of identical content.

use anyhow::anyhow;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::constants;
use crate::engine::narrative::NarrativeCache;
use crate::engine::types::{Memory, MemorySource, TriageDecision};
use crate::errors::StoreError;
use crate::metrics;
use crate::stores::StoreAdapter;

pub struct MemoryWritePipeline {
    relational: Arc<StoreAdapter>,
    vector: Arc<StoreAdapter>,
    graph: Arc<StoreAdapter>,
    narrative: Arc<NarrativeCache>,
    /// "user_id:content_hash" -> () claimed markers
    dedup: Mutex<LruCache<String, ()>>,
}

impl MemoryWritePipeline {
    pub fn new(
        relational: Arc<StoreAdapter>,
        vector: Arc<StoreAdapter>,
        graph: Arc<StoreAdapter>,
        narrative: Arc<NarrativeCache>,
        dedup_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(dedup_capacity.max(1))
            .unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            relational,
            vector,
            graph,
            narrative,
            dedup: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Accept a triage decision for durable storage.
    ///
    /// Returns Ok(None) when the content deduplicated against a recent write.
    pub async fn accept(
        &self,
        triage: &TriageDecision,
        user_id: &str,
    ) -> anyhow::Result<Option<Memory>> {
        if !triage.remember || triage.canonical_content.trim().is_empty() {
            return Ok(None);
        }

        let mut memory = Memory::new(user_id, &triage.canonical_content, &triage.canonical_content);
        memory.priority = triage.priority;
        memory.source = MemorySource::Triage;

        self.write(memory).await
    }

    /// Write a fully-formed memory (used by explicit remember calls).
    pub async fn write(&self, memory: Memory) -> anyhow::Result<Option<Memory>> {
        let _timer = metrics::Timer::new(metrics::MEMORY_WRITE_DURATION.clone());

        let dedup_key = format!("{}:{}", memory.user_id, memory.content_hash);

        // Claim the hash before writing so concurrent identical submissions
        // collapse to exactly one durable record.
        {
            let mut dedup = self.dedup.lock();
            if dedup.contains(&dedup_key) {
                debug!(user_id = %memory.user_id, "Duplicate content, skipping write");
                metrics::MEMORY_WRITES_TOTAL
                    .with_label_values(&["deduplicated"])
                    .inc();
                return Ok(None);
            }
            dedup.put(dedup_key.clone(), ());
        }

        let (relational, vector, graph) = tokio::join!(
            write_with_retry(&self.relational, &memory),
            write_with_retry(&self.vector, &memory),
            write_with_retry(&self.graph, &memory),
        );

        if let Err(e) = relational {
            // Source of truth failed: the memory does not exist. Release the
            // claim so a later submission can try again.
            self.dedup.lock().pop(&dedup_key);
            metrics::MEMORY_WRITES_TOTAL
                .with_label_values(&["rejected"])
                .inc();
            return Err(anyhow!("relational write failed: {e}"));
        }

        let mut degraded = false;
        if let Err(e) = vector {
            warn!(user_id = %memory.user_id, memory_id = %memory.id, "Vector write failed (best-effort): {}", e);
            degraded = true;
        }
        if let Err(e) = graph {
            warn!(user_id = %memory.user_id, memory_id = %memory.id, "Graph write failed (best-effort): {}", e);
            degraded = true;
        }

        metrics::MEMORY_WRITES_TOTAL
            .with_label_values(&[if degraded { "degraded" } else { "accepted" }])
            .inc();

        // Next new conversation must regenerate the narrative
        self.narrative.invalidate(&memory.user_id);

        Ok(Some(memory))
    }

    /// Read a memory from the relational store (the source of truth).
    pub async fn get(
        &self,
        user_id: &str,
        memory_id: &crate::engine::types::MemoryId,
    ) -> anyhow::Result<Option<Memory>> {
        self.relational
            .get(user_id, memory_id)
            .await
            .map_err(|e| anyhow!("relational read failed: {e}"))
    }
}

/// One attempt plus one retry after a short delay.
async fn write_with_retry(adapter: &StoreAdapter, memory: &Memory) -> Result<(), StoreError> {
    match adapter.upsert(memory).await {
        Ok(()) => Ok(()),
        Err(first) => {
            debug!(store = %adapter.kind(), "Store write failed, retrying once: {}", first);
            tokio::time::sleep(constants::STORE_WRITE_RETRY_DELAY).await;
            adapter.upsert(memory).await
        }
    }
}
