//! Uniform client interface over the three backing stores
//!
//! The engine never talks to a database driver directly: it consumes `Store`
//! trait objects wrapped in a `StoreAdapter` that adds a call budget, latency
//! instrumentation, and a circuit breaker. Production deployments implement
//! `Store` against their vector / graph / relational backends; the in-memory
//! implementations in `mem` keep the binary self-contained and the tests
//! fast.

mod adapter;
mod breaker;
pub mod mem;

pub use adapter::StoreAdapter;
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::types::{Memory, MemoryId, SearchResult};

/// The three heterogeneous store families the router fans out across
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Semantic similarity store
    Vector,
    /// Relationship / traversal store
    Graph,
    /// Exact-lookup metadata store (source of truth for existence)
    Relational,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Graph => "graph",
            Self::Relational => "relational",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A backing store. All calls are async and must honor future cancellation:
/// when the adapter's budget elapses the in-flight call is dropped.
#[async_trait]
pub trait Store: Send + Sync {
    /// Search this store for memories relevant to `query`
    async fn search(&self, user_id: &str, query: &str, limit: usize)
        -> Result<Vec<SearchResult>>;

    /// Insert or replace a memory record
    async fn upsert(&self, memory: &Memory) -> Result<()>;

    /// Fetch a single memory by id
    async fn get(&self, user_id: &str, memory_id: &MemoryId) -> Result<Option<Memory>>;

    /// Which store family this is (used for metrics labels and ranking)
    fn kind(&self) -> StoreKind;
}
