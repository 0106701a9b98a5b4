//! Smriti-Context Library
//!
//! Personal-memory context engine for AI assistants: decides whether an
//! incoming message needs personalized context, retrieves and synthesizes it
//! under a hard latency budget, and improves the user's long-term memory
//! store in the background.
//!
//! # Key Features
//! - Dual-path execution: deadline-bounded fast path, detached background path
//! - Hybrid retrieval across vector, graph, and relational stores with
//!   per-store timeouts and circuit-breaker fallback
//! - Triage classification with a fail-closed policy
//! - TTL-bounded per-user narrative cache
//! - Dedup'd durable writes with partial-failure tracking

pub mod auth;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod reasoner;
pub mod stores;
pub mod tracing_setup;
pub mod validation;

// Re-export dependencies to ensure tests/benchmarks use the same version
pub use chrono;
pub use parking_lot;
pub use uuid;
