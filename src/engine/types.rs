//! Core data model for the context orchestration engine
//!
//! `Memory` is the durable substrate; `SearchResult`, `StrategyDecision`, and
//! `TriageDecision` are query-scoped and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::stores::StoreKind;

/// Unique memory identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a memory came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Accepted by the triage classifier from a conversation turn
    #[default]
    Triage,
    /// Explicit client-initiated remember call
    Explicit,
}

/// Write priority assigned by triage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl MemoryPriority {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Normal,
        }
    }
}

/// A durable memory record.
///
/// Owned exclusively by the write pipeline once accepted; immutable after
/// creation except for soft-delete. No two records for the same user share a
/// `content_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub user_id: String,
    /// Raw content as received
    pub content: String,
    /// Canonicalized content produced by triage (the dedup basis)
    pub canonical_content: String,
    /// sha256 over normalized canonical content
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    /// Opaque handle into the vector store's embedding space, if any
    pub embedding_ref: Option<String>,
    pub source: MemorySource,
    pub priority: MemoryPriority,
    /// Soft-delete flag; deleted memories are excluded from search
    pub deleted: bool,
}

impl Memory {
    /// Build a new memory from canonical content, computing the dedup hash
    pub fn new(user_id: &str, content: &str, canonical_content: &str) -> Self {
        Self {
            id: MemoryId::new(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            canonical_content: canonical_content.to_string(),
            content_hash: content_hash(canonical_content),
            created_at: Utc::now(),
            tags: Vec::new(),
            embedding_ref: None,
            source: MemorySource::Triage,
            priority: MemoryPriority::Normal,
            deleted: false,
        }
    }
}

/// Compute the dedup hash over canonical content.
///
/// Normalization (lowercase, collapsed whitespace) makes trivially restated
/// duplicates collide while leaving genuinely different content distinct.
pub fn content_hash(canonical_content: &str) -> String {
    let normalized: String = canonical_content
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();

    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// A single search hit, scoped to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub memory_id: MemoryId,
    pub content: String,
    pub score: f32,
    pub source_store: StoreKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Thoroughness level of context retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyDepth {
    /// No store access; return immediately
    None,
    /// 1-3 targeted queries under the tight fast-path deadline
    Relevant,
    /// 5-10 queries across all applicable stores, graph traversal included
    Deep,
    /// 10+ queries with the highest caps; explicit requests and background only
    Comprehensive,
}

impl StrategyDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Relevant => "relevant",
            Self::Deep => "deep",
            Self::Comprehensive => "comprehensive",
        }
    }
}

/// Classification of a query, used to select which stores to consult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingClass {
    /// Exact lookup ("what's my dog's name") - relational store only
    Factual,
    /// Meaning-based recall - vector store
    Semantic,
    /// Relationship questions - vector + graph
    Relational,
    /// Time-anchored questions - vector + graph
    Temporal,
    /// Multi-faceted questions - all three stores
    Complex,
}

impl RoutingClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Semantic => "semantic",
            Self::Relational => "relational",
            Self::Temporal => "temporal",
            Self::Complex => "complex",
        }
    }

    /// Which stores this routing class consults: (vector, graph, relational)
    pub fn store_selection(&self) -> (bool, bool, bool) {
        match self {
            Self::Factual => (false, false, true),
            Self::Semantic => (true, false, false),
            Self::Relational | Self::Temporal => (true, true, false),
            Self::Complex => (true, true, true),
        }
    }
}

/// Retrieval plan for one incoming message.
///
/// Produced once per message by the planner, consumed by the router,
/// discarded after the response is built.
#[derive(Debug, Clone)]
pub struct StrategyDecision {
    pub depth: StrategyDepth,
    pub queries: Vec<String>,
    pub routing: RoutingClass,
    pub use_vector: bool,
    pub use_graph: bool,
    pub use_relational: bool,
    pub per_store_limit: usize,
    pub deadline: Duration,
}

/// Remember/skip decision for one message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageDecision {
    pub remember: bool,
    /// Canonicalized fact extracted from the message (dedup basis)
    pub canonical_content: String,
    pub priority: MemoryPriority,
}

impl TriageDecision {
    /// The fail-closed default: never memorize what the classifier could not vet
    pub fn skip() -> Self {
        Self {
            remember: false,
            canonical_content: String::new(),
            priority: MemoryPriority::Normal,
        }
    }
}

/// Conversation state as reported by the caller
#[derive(Debug, Clone, Copy)]
pub struct ConversationState {
    pub is_new_conversation: bool,
    pub needs_context: bool,
}

/// Result returned to the caller.
///
/// Empty `context_text` is valid and means "no relevant context" or
/// "context not needed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResult {
    pub context_text: String,
    pub strategy_used: String,
}
