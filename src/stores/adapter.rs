//! Latency-instrumented, budget-bounded store access
//!
//! Every store call goes through an adapter: the circuit breaker is consulted
//! first, the call runs under `tokio::time::timeout`, and the outcome feeds
//! both the breaker and the metrics. A dropped future (caller disconnect or
//! router deadline) cancels the in-flight call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::engine::types::{Memory, MemoryId, SearchResult};
use crate::errors::StoreError;
use crate::metrics;

use super::{CircuitBreaker, CircuitBreakerConfig, CircuitState, Store, StoreKind};

pub struct StoreAdapter {
    kind: StoreKind,
    inner: Arc<dyn Store>,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl StoreAdapter {
    pub fn new(
        inner: Arc<dyn Store>,
        timeout: Duration,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let kind = inner.kind();
        Self {
            kind,
            inner,
            timeout,
            breaker: CircuitBreaker::new(kind, breaker_config),
        }
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Search with budget, breaker, and instrumentation.
    ///
    /// Timeouts and backend errors are recovered by the caller (the router
    /// excludes this store from the merged results); they are never surfaced
    /// to the end user.
    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        if !self.breaker.allow() {
            metrics::STORE_SEARCH_TOTAL
                .with_label_values(&[self.kind.as_str(), "circuit_open"])
                .inc();
            return Err(StoreError::CircuitOpen);
        }

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.inner.search(user_id, query, limit))
            .await;

        metrics::STORE_SEARCH_DURATION
            .with_label_values(&[self.kind.as_str()])
            .observe(start.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(results)) => {
                self.breaker.record_success();
                metrics::STORE_SEARCH_TOTAL
                    .with_label_values(&[self.kind.as_str(), "ok"])
                    .inc();
                Ok(results)
            }
            Ok(Err(e)) => {
                self.breaker.record_failure();
                metrics::STORE_SEARCH_TOTAL
                    .with_label_values(&[self.kind.as_str(), "backend"])
                    .inc();
                Err(StoreError::Backend(e))
            }
            Err(_) => {
                self.breaker.record_failure();
                metrics::STORE_SEARCH_TOTAL
                    .with_label_values(&[self.kind.as_str(), "timeout"])
                    .inc();
                Err(StoreError::Timeout {
                    budget: self.timeout,
                })
            }
        }
    }

    /// Upsert with budget and instrumentation.
    ///
    /// Writes share the search budget's breaker so a dead store stops
    /// receiving traffic from both paths.
    pub async fn upsert(&self, memory: &Memory) -> Result<(), StoreError> {
        if !self.breaker.allow() {
            metrics::STORE_UPSERT_TOTAL
                .with_label_values(&[self.kind.as_str(), "circuit_open"])
                .inc();
            return Err(StoreError::CircuitOpen);
        }

        let outcome = tokio::time::timeout(self.timeout, self.inner.upsert(memory)).await;

        match outcome {
            Ok(Ok(())) => {
                self.breaker.record_success();
                metrics::STORE_UPSERT_TOTAL
                    .with_label_values(&[self.kind.as_str(), "ok"])
                    .inc();
                Ok(())
            }
            Ok(Err(e)) => {
                self.breaker.record_failure();
                metrics::STORE_UPSERT_TOTAL
                    .with_label_values(&[self.kind.as_str(), "backend"])
                    .inc();
                Err(StoreError::Backend(e))
            }
            Err(_) => {
                self.breaker.record_failure();
                metrics::STORE_UPSERT_TOTAL
                    .with_label_values(&[self.kind.as_str(), "timeout"])
                    .inc();
                Err(StoreError::Timeout {
                    budget: self.timeout,
                })
            }
        }
    }

    /// Fetch a memory by id, budget-bounded
    pub async fn get(
        &self,
        user_id: &str,
        memory_id: &MemoryId,
    ) -> Result<Option<Memory>, StoreError> {
        let outcome = tokio::time::timeout(self.timeout, self.inner.get(user_id, memory_id)).await;

        match outcome {
            Ok(Ok(memory)) => Ok(memory),
            Ok(Err(e)) => Err(StoreError::Backend(e)),
            Err(_) => Err(StoreError::Timeout {
                budget: self.timeout,
            }),
        }
    }
}
