//! In-memory reference implementations of the three stores
//!
//! These keep the binary self-contained and give the tests real concurrent
//! stores to exercise. Production deployments swap in adapters over their
//! actual backends; the engine only sees the `Store` trait either way.
//!
//! The vector store uses a hash-projection embedding: deterministic, cheap,
//! and good enough to make cosine ranking meaningful without an embedding
//! model in the loop.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet};

use crate::engine::types::{Memory, MemoryId, SearchResult};

use super::{Store, StoreKind};

/// Cap on entities extracted per memory. Prevents O(n²) edge explosion in
/// the co-occurrence graph: 10 entities → max 45 edges.
const MAX_ENTITIES_PER_MEMORY: usize = 10;

/// Hash-projection embedding dimension
const EMBEDDING_DIMENSION: usize = 64;

// =============================================================================
// RELATIONAL STORE
// =============================================================================

/// Exact-lookup store; the source of truth for memory existence.
#[derive(Default)]
pub struct InMemoryRelationalStore {
    /// user_id -> memories
    memories: DashMap<String, Vec<Memory>>,
}

impl InMemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-deleted) memories for a user
    pub fn count(&self, user_id: &str) -> usize {
        self.memories
            .get(user_id)
            .map(|m| m.iter().filter(|m| !m.deleted).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Store for InMemoryRelationalStore {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let query_tokens: Vec<String> = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        if let Some(memories) = self.memories.get(user_id) {
            for memory in memories.iter().filter(|m| !m.deleted) {
                let content_lower = memory.canonical_content.to_lowercase();
                let matched = query_tokens
                    .iter()
                    .filter(|t| content_lower.contains(t.as_str()))
                    .count();
                if matched == 0 {
                    continue;
                }
                let score = matched as f32 / query_tokens.len() as f32;
                results.push(SearchResult {
                    memory_id: memory.id.clone(),
                    content: memory.canonical_content.clone(),
                    score,
                    source_store: StoreKind::Relational,
                    created_at: memory.created_at,
                    metadata: HashMap::new(),
                });
            }
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }

    async fn upsert(&self, memory: &Memory) -> Result<()> {
        let mut entry = self.memories.entry(memory.user_id.clone()).or_default();
        if let Some(existing) = entry.iter_mut().find(|m| m.id == memory.id) {
            // Last-write-wins by created_at
            if memory.created_at >= existing.created_at {
                *existing = memory.clone();
            }
        } else {
            entry.push(memory.clone());
        }
        Ok(())
    }

    async fn get(&self, user_id: &str, memory_id: &MemoryId) -> Result<Option<Memory>> {
        Ok(self
            .memories
            .get(user_id)
            .and_then(|m| m.iter().find(|m| &m.id == memory_id).cloned()))
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Relational
    }
}

// =============================================================================
// VECTOR STORE
// =============================================================================

/// Semantic similarity store over hash-projection embeddings.
#[derive(Default)]
pub struct InMemoryVectorStore {
    /// user_id -> (memory, embedding)
    entries: DashMap<String, Vec<(Memory, Vec<f32>)>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryVectorStore {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let query_embedding = hash_embedding(query, EMBEDDING_DIMENSION);

        let mut results = Vec::new();
        if let Some(entries) = self.entries.get(user_id) {
            for (memory, embedding) in entries.iter().filter(|(m, _)| !m.deleted) {
                let score = cosine_similarity(&query_embedding, embedding);
                if score <= 0.0 {
                    continue;
                }
                results.push(SearchResult {
                    memory_id: memory.id.clone(),
                    content: memory.canonical_content.clone(),
                    score,
                    source_store: StoreKind::Vector,
                    created_at: memory.created_at,
                    metadata: HashMap::new(),
                });
            }
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }

    async fn upsert(&self, memory: &Memory) -> Result<()> {
        let embedding = hash_embedding(&memory.canonical_content, EMBEDDING_DIMENSION);
        let mut entry = self.entries.entry(memory.user_id.clone()).or_default();
        if let Some(existing) = entry.iter_mut().find(|(m, _)| m.id == memory.id) {
            *existing = (memory.clone(), embedding);
        } else {
            entry.push((memory.clone(), embedding));
        }
        Ok(())
    }

    async fn get(&self, user_id: &str, memory_id: &MemoryId) -> Result<Option<Memory>> {
        Ok(self
            .entries
            .get(user_id)
            .and_then(|e| e.iter().find(|(m, _)| &m.id == memory_id).map(|(m, _)| m.clone())))
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Vector
    }
}

// =============================================================================
// GRAPH STORE
// =============================================================================

/// Per-user entity co-occurrence graph
struct UserGraph {
    graph: UnGraph<String, f32>,
    node_index: HashMap<String, NodeIndex>,
    /// entity -> memory ids mentioning it
    entity_memories: HashMap<String, HashSet<MemoryId>>,
    memories: HashMap<MemoryId, Memory>,
}

impl UserGraph {
    fn new() -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            node_index: HashMap::new(),
            entity_memories: HashMap::new(),
            memories: HashMap::new(),
        }
    }

    fn node_for(&mut self, entity: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(entity) {
            return idx;
        }
        let idx = self.graph.add_node(entity.to_string());
        self.node_index.insert(entity.to_string(), idx);
        idx
    }
}

/// Relationship store: entities co-occurring in a memory become connected
/// nodes; search seeds from query entities and walks one hop out.
#[derive(Default)]
pub struct InMemoryGraphStore {
    users: DashMap<String, RwLock<UserGraph>>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InMemoryGraphStore {
    fn with_user<R>(&self, user_id: &str, f: impl FnOnce(&mut UserGraph) -> R) -> R {
        let entry = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| RwLock::new(UserGraph::new()));
        let mut guard = entry.write();
        f(&mut guard)
    }
}

#[async_trait]
impl Store for InMemoryGraphStore {
    async fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let query_entities = extract_entities(query, MAX_ENTITIES_PER_MEMORY);
        if query_entities.is_empty() {
            return Ok(Vec::new());
        }

        let Some(entry) = self.users.get(user_id) else {
            return Ok(Vec::new());
        };
        let graph = entry.read();

        // Seed score 1.0 for memories mentioning a query entity directly,
        // 0.5 for memories reached through one co-occurrence hop.
        let mut scores: HashMap<MemoryId, f32> = HashMap::new();
        let mut matched: HashMap<MemoryId, HashSet<String>> = HashMap::new();

        for entity in &query_entities {
            if let Some(ids) = graph.entity_memories.get(entity) {
                for id in ids {
                    *scores.entry(id.clone()).or_insert(0.0) += 1.0;
                    matched.entry(id.clone()).or_default().insert(entity.clone());
                }
            }

            if let Some(&idx) = graph.node_index.get(entity) {
                for neighbor in graph.graph.neighbors(idx) {
                    let neighbor_entity = &graph.graph[neighbor];
                    if let Some(ids) = graph.entity_memories.get(neighbor_entity) {
                        for id in ids {
                            *scores.entry(id.clone()).or_insert(0.0) += 0.5;
                            matched
                                .entry(id.clone())
                                .or_default()
                                .insert(neighbor_entity.clone());
                        }
                    }
                }
            }
        }

        let denominator = query_entities.len() as f32 * 1.5;
        let mut results: Vec<SearchResult> = scores
            .into_iter()
            .filter_map(|(id, raw)| {
                let memory = graph.memories.get(&id)?;
                if memory.deleted {
                    return None;
                }
                let mut metadata = HashMap::new();
                if let Some(entities) = matched.get(&id) {
                    let mut names: Vec<_> = entities.iter().cloned().collect();
                    names.sort();
                    metadata.insert("matched_entities".to_string(), names.join(","));
                }
                Some(SearchResult {
                    memory_id: id,
                    content: memory.canonical_content.clone(),
                    score: (raw / denominator).min(1.0),
                    source_store: StoreKind::Graph,
                    created_at: memory.created_at,
                    metadata,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }

    async fn upsert(&self, memory: &Memory) -> Result<()> {
        let mut entities = extract_entities(&memory.canonical_content, MAX_ENTITIES_PER_MEMORY);
        for tag in &memory.tags {
            if entities.len() >= MAX_ENTITIES_PER_MEMORY {
                break;
            }
            let tag = tag.to_lowercase();
            if !entities.contains(&tag) {
                entities.push(tag);
            }
        }

        self.with_user(&memory.user_id, |graph| {
            graph.memories.insert(memory.id.clone(), memory.clone());

            let indices: Vec<NodeIndex> = entities.iter().map(|e| graph.node_for(e)).collect();

            for entity in &entities {
                graph
                    .entity_memories
                    .entry(entity.clone())
                    .or_default()
                    .insert(memory.id.clone());
            }

            // Co-occurrence edges between every entity pair in this memory
            for i in 0..indices.len() {
                for j in (i + 1)..indices.len() {
                    match graph.graph.find_edge(indices[i], indices[j]) {
                        Some(edge) => {
                            if let Some(weight) = graph.graph.edge_weight_mut(edge) {
                                *weight += 1.0;
                            }
                        }
                        None => {
                            graph.graph.add_edge(indices[i], indices[j], 1.0);
                        }
                    }
                }
            }
        });

        Ok(())
    }

    async fn get(&self, user_id: &str, memory_id: &MemoryId) -> Result<Option<Memory>> {
        Ok(self
            .users
            .get(user_id)
            .and_then(|g| g.read().memories.get(memory_id).cloned()))
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Graph
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.len() > 1)
        .collect()
}

/// Extract entity-like tokens: capitalized words that aren't common
/// sentence-starters, lowercased for stable graph keys.
pub fn extract_entities(text: &str, cap: usize) -> Vec<String> {
    const NON_ENTITIES: &[&str] = &[
        "The", "This", "That", "What", "When", "Where", "Who", "How", "Why", "Is", "Are", "Do",
        "Does", "Did", "Can", "Could", "Would", "Should", "My", "Your", "Remember", "Tell", "I",
        "A", "An", "It", "We", "You", "They",
    ];

    let mut entities = Vec::new();
    for word in text.split_whitespace() {
        let cleaned = word.trim_matches(|c: char| !c.is_alphanumeric());
        if cleaned.len() < 2 || cleaned.len() > 40 {
            continue;
        }
        if !cleaned.chars().all(|c| c.is_alphanumeric()) {
            continue;
        }
        let first_upper = cleaned
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false);
        if !first_upper {
            continue;
        }
        if NON_ENTITIES.iter().any(|n| n.eq_ignore_ascii_case(cleaned)) {
            continue;
        }
        let key = cleaned.to_lowercase();
        if !entities.contains(&key) {
            entities.push(key);
        }
        if entities.len() >= cap {
            break;
        }
    }
    entities
}

/// Deterministic hash-projection embedding, normalized to unit length.
///
/// Each token contributes a signed bit pattern derived from its hash, so
/// shared tokens correlate and unrelated text lands near-orthogonal.
pub fn hash_embedding(text: &str, dimension: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut embedding = vec![0.0_f32; dimension];

    for word in tokenize(text) {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        let hash = hasher.finish();

        for (j, slot) in embedding.iter_mut().enumerate() {
            let bit = (hash >> (j % 64)) & 1;
            *slot += if bit == 1 { 0.1 } else { -0.1 };
        }
    }

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut embedding {
            *val /= norm;
        }
    }

    embedding
}

/// Compute cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
