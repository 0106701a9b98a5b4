//! The context orchestration engine
//!
//! Dual-path execution: a deadline-bounded fast path (plan → fan-out search →
//! respond) and a detached background path (triage → durable writes, deep
//! narrative refresh). See `orchestrator` for the composition.

pub mod background;
pub mod classifier;
pub mod narrative;
pub mod orchestrator;
pub mod planner;
pub mod router;
pub mod triage;
pub mod types;
pub mod write_pipeline;

pub use narrative::{NarrativeCache, NarrativeCacheEntry};
pub use orchestrator::Orchestrator;
pub use planner::{PlanOutcome, StrategyPlanner};
pub use router::HybridSearchRouter;
pub use triage::TriageClassifier;
pub use types::{
    ContextResult, ConversationState, Memory, MemoryId, MemoryPriority, MemorySource,
    RoutingClass, SearchResult, StrategyDecision, StrategyDepth, TriageDecision,
};
pub use write_pipeline::MemoryWritePipeline;
