//! Documented constants for the context engine
//!
//! All tunable parameters in one place with justification for their values.
//! Centralizing constants prevents magic numbers and makes tuning easier.
//! Every value here can be overridden through `config.rs` environment
//! variables; these are the defaults.

use std::time::Duration;

// =============================================================================
// FAST-PATH LATENCY BUDGETS
// The fast path must answer before the assistant starts generating, so every
// budget here is a hard ceiling, not a target.
// =============================================================================

/// Total response deadline for Relevant-depth retrieval (3s)
///
/// Justification:
/// - 1-3 targeted queries against at most three stores
/// - Large enough to absorb one slow graph lookup (3s per-store budget)
/// - Small enough that the assistant's first token is not visibly delayed
pub const RELEVANT_DEADLINE: Duration = Duration::from_secs(3);

/// Total response deadline for Deep-depth retrieval (8s)
///
/// Deep runs 5-10 queries with graph traversal; it is only entered on a cold
/// new conversation where the caller expects a slower first turn.
pub const DEEP_DEADLINE: Duration = Duration::from_secs(8);

/// Total response deadline for Comprehensive-depth retrieval (15s)
///
/// Reserved for explicit "tell me everything" requests and background
/// analysis. Never entered implicitly on the fast path.
pub const COMPREHENSIVE_DEADLINE: Duration = Duration::from_secs(15);

// =============================================================================
// PER-STORE CALL BUDGETS
// Strictly smaller than every total deadline so a single slow store can never
// consume the whole response budget.
// =============================================================================

/// Vector store search budget (1s)
///
/// ANN search is fast when healthy; a vector lookup that takes longer than a
/// second is a degraded index and excluding it loses little.
pub const VECTOR_STORE_TIMEOUT: Duration = Duration::from_secs(1);

/// Relational store search budget (500ms)
///
/// Exact keyed lookups are the cheapest call we make. Half a second already
/// covers a slow network round-trip plus a cold page read.
pub const RELATIONAL_STORE_TIMEOUT: Duration = Duration::from_millis(500);

/// Graph store search budget (3s)
///
/// Graph traversal is the slowest and least reliable store. 3s keeps it
/// usable for Deep retrieval while the circuit breaker caps the damage of a
/// repeatedly failing backend.
pub const GRAPH_STORE_TIMEOUT: Duration = Duration::from_secs(3);

// =============================================================================
// QUERY AND RESULT CAPS PER STRATEGY DEPTH
// =============================================================================

/// Maximum queries at Relevant depth
pub const RELEVANT_MAX_QUERIES: usize = 3;

/// Maximum queries at Deep depth
pub const DEEP_MAX_QUERIES: usize = 8;

/// Maximum queries at Comprehensive depth
pub const COMPREHENSIVE_MAX_QUERIES: usize = 12;

/// Per-store result cap at Relevant depth
pub const RELEVANT_PER_STORE_LIMIT: usize = 15;

/// Per-store result cap at Deep depth
pub const DEEP_PER_STORE_LIMIT: usize = 40;

/// Per-store result cap at Comprehensive depth
pub const COMPREHENSIVE_PER_STORE_LIMIT: usize = 100;

// =============================================================================
// REASONER BUDGETS
// External model calls sit on the fast path, so their budgets are tight and
// every failure falls back deterministically.
// =============================================================================

/// Triage classification budget (2s)
///
/// On timeout the decision is remember=false (fail closed): we never block
/// the caller and never memorize content the classifier could not vet.
pub const TRIAGE_TIMEOUT: Duration = Duration::from_secs(2);

/// Strategy planning / query expansion budget (1.5s)
///
/// On timeout the planner falls back to Relevant depth with the raw message
/// as the single query rather than failing the request.
pub const PLAN_TIMEOUT: Duration = Duration::from_millis(1500);

/// Background narrative synthesis budget (20s)
///
/// The background path has no caller waiting, so it gets a generous budget,
/// but it is still bounded: a wedged reasoner must not pin a worker forever.
pub const NARRATIVE_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(20);

// =============================================================================
// CIRCUIT BREAKER
// =============================================================================

/// Consecutive failures before the breaker opens
///
/// 5 filters out isolated blips while reacting within a handful of requests
/// to a genuinely down backend.
pub const BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// Consecutive successes needed to close from half-open
pub const BREAKER_SUCCESS_THRESHOLD: u32 = 2;

/// Cool-down the breaker stays open before probing recovery (30s)
pub const BREAKER_OPEN_DURATION: Duration = Duration::from_secs(30);

// =============================================================================
// NARRATIVE CACHE
// =============================================================================

/// Default narrative TTL (7 days)
///
/// A user's narrative summary changes slowly; explicit invalidation on every
/// accepted memory write keeps it fresh well before the TTL matters.
pub const NARRATIVE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// =============================================================================
// WRITE PIPELINE
// =============================================================================

/// Capacity of the content-hash dedup LRU (entries, across users)
///
/// 4096 hashes cover several active sessions per user; the LRU is a
/// session-scale duplicate filter, not a durable uniqueness index.
pub const DEDUP_CACHE_CAPACITY: usize = 4096;

/// Delay before the single retry of a failed store write (50ms)
pub const STORE_WRITE_RETRY_DELAY: Duration = Duration::from_millis(50);

// =============================================================================
// BACKGROUND EXECUTION
// =============================================================================

/// Bounded background queue capacity
///
/// Once full, new tasks are dropped with a logged warning. The fast path is
/// never blocked to make room.
pub const BACKGROUND_QUEUE_CAPACITY: usize = 256;

/// Number of background worker tasks per process
pub const BACKGROUND_WORKERS: usize = 4;

/// Per-task deadline on the background path (30s)
pub const BACKGROUND_TASK_DEADLINE: Duration = Duration::from_secs(30);

// =============================================================================
// CONTEXT RENDERING
// =============================================================================

/// Maximum rendered context size for Relevant-depth responses (chars)
pub const RELEVANT_CONTEXT_MAX_CHARS: usize = 2_000;

/// Maximum rendered context size for Deep/Comprehensive responses (chars)
pub const DEEP_CONTEXT_MAX_CHARS: usize = 6_000;
