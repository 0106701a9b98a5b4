//! Top-level dual-path orchestration
//!
//! Composes triage, planning, routing, caching, and the write pipeline into
//! the fast/background execution model. The fast path is synchronous and
//! deadline-bounded; the background path is enqueued before retrieval even
//! starts and never blocks or outlives-cancels the caller's request.

use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::EngineConfig;
use crate::constants;
use crate::engine::background::{BackgroundContext, BackgroundQueue, BackgroundTask};
use crate::engine::narrative::NarrativeCache;
use crate::engine::planner::{PlanOutcome, StrategyPlanner};
use crate::engine::router::HybridSearchRouter;
use crate::engine::triage::TriageClassifier;
use crate::engine::types::{ContextResult, ConversationState, SearchResult, StrategyDepth};
use crate::engine::write_pipeline::MemoryWritePipeline;
use crate::errors::{Result, ValidationErrorExt};
use crate::metrics;
use crate::reasoner::Reasoner;
use crate::stores::{CircuitBreakerConfig, Store, StoreAdapter};
use crate::validation;

pub struct Orchestrator {
    planner: Arc<StrategyPlanner>,
    router: Arc<HybridSearchRouter>,
    narrative: Arc<NarrativeCache>,
    pipeline: Arc<MemoryWritePipeline>,
    background: BackgroundQueue,
}

impl Orchestrator {
    /// Wire up the engine from its injected collaborators.
    ///
    /// The shared mutable structures (dedup LRU, narrative cache) are owned
    /// here, never package-level singletons, so each instance is isolated.
    pub fn new(
        vector: Arc<dyn Store>,
        graph: Arc<dyn Store>,
        relational: Arc<dyn Store>,
        reasoner: Arc<dyn Reasoner>,
        config: EngineConfig,
    ) -> Self {
        let breaker_config = CircuitBreakerConfig {
            failure_threshold: config.breaker_failure_threshold,
            success_threshold: config.breaker_success_threshold,
            open_duration: config.breaker_open_duration,
        };

        let vector = Arc::new(StoreAdapter::new(
            vector,
            config.vector_timeout,
            breaker_config.clone(),
        ));
        let graph = Arc::new(StoreAdapter::new(
            graph,
            config.graph_timeout,
            breaker_config.clone(),
        ));
        let relational = Arc::new(StoreAdapter::new(
            relational,
            config.relational_timeout,
            breaker_config,
        ));

        let narrative = Arc::new(NarrativeCache::new());

        let router = Arc::new(HybridSearchRouter::new(
            vector.clone(),
            graph.clone(),
            relational.clone(),
            config.store_priority.clone(),
        ));

        let planner = Arc::new(StrategyPlanner::new(
            reasoner.clone(),
            narrative.clone(),
            config.clone(),
        ));

        let triage = Arc::new(TriageClassifier::new(
            reasoner.clone(),
            config.triage_timeout,
        ));

        let pipeline = Arc::new(MemoryWritePipeline::new(
            relational,
            vector,
            graph,
            narrative.clone(),
            config.dedup_capacity,
        ));

        let background = BackgroundQueue::start(
            Arc::new(BackgroundContext {
                triage,
                pipeline: pipeline.clone(),
                planner: planner.clone(),
                router: router.clone(),
                narrative: narrative.clone(),
                reasoner,
                config: config.clone(),
            }),
            config.background_queue_capacity,
            config.background_workers,
        );

        Self {
            planner,
            router,
            narrative,
            pipeline,
            background,
        }
    }

    /// The one logical operation this engine exposes.
    ///
    /// The background triage task is enqueued unconditionally before the fast
    /// path runs: memorability is orthogonal to whether context is needed
    /// this turn.
    pub async fn process_message(
        &self,
        user_id: &str,
        message: &str,
        is_new_conversation: bool,
        needs_context: bool,
    ) -> Result<ContextResult> {
        validation::validate_user_id(user_id).map_validation_err("user_id")?;
        validation::validate_message(message).map_validation_err("message")?;

        let start = Instant::now();

        self.background.enqueue(BackgroundTask::TriageAndWrite {
            user_id: user_id.to_string(),
            message: message.to_string(),
        });

        let state = ConversationState {
            is_new_conversation,
            needs_context,
        };

        let outcome = self.planner.plan(user_id, state, message).await;

        let result = match outcome {
            PlanOutcome::Skip => ContextResult {
                context_text: String::new(),
                strategy_used: "none".to_string(),
            },
            PlanOutcome::ServeNarrative(text) => ContextResult {
                context_text: text,
                strategy_used: "narrative".to_string(),
            },
            PlanOutcome::Retrieve(decision) => {
                let results = self.router.execute(user_id, &decision).await;
                debug!(
                    user_id,
                    depth = decision.depth.as_str(),
                    queries = decision.queries.len(),
                    results = results.len(),
                    "Fast-path retrieval complete"
                );

                // A cold new conversation seeds the narrative for the next one
                if decision.depth == StrategyDepth::Deep {
                    self.background.enqueue(BackgroundTask::RefreshNarrative {
                        user_id: user_id.to_string(),
                        message: message.to_string(),
                    });
                }

                let max_chars = match decision.depth {
                    StrategyDepth::Relevant => constants::RELEVANT_CONTEXT_MAX_CHARS,
                    _ => constants::DEEP_CONTEXT_MAX_CHARS,
                };

                ContextResult {
                    context_text: render_context(&results, max_chars),
                    strategy_used: decision.depth.as_str().to_string(),
                }
            }
        };

        metrics::CONTEXT_REQUESTS_TOTAL
            .with_label_values(&[&result.strategy_used])
            .inc();
        metrics::CONTEXT_REQUEST_DURATION
            .with_label_values(&[&result.strategy_used])
            .observe(start.elapsed().as_secs_f64());

        Ok(result)
    }

    /// Write pipeline handle for explicit remember calls
    pub fn pipeline(&self) -> &MemoryWritePipeline {
        &self.pipeline
    }

    /// Router handle for readiness reporting
    pub fn router(&self) -> &HybridSearchRouter {
        &self.router
    }

    /// Narrative cache handle (background path writes it; exposed for
    /// diagnostics and tests)
    pub fn narrative(&self) -> &NarrativeCache {
        &self.narrative
    }
}

/// Render merged results into the context block handed to the assistant.
/// "No context found" renders as an empty string - a valid, silent outcome.
fn render_context(results: &[SearchResult], max_chars: usize) -> String {
    let mut out = String::new();
    for result in results {
        let content = result.content.trim();
        if content.is_empty() {
            continue;
        }
        let line = format!("- {content}\n");
        if out.len() + line.len() > max_chars {
            break;
        }
        out.push_str(&line);
    }
    out.trim_end().to_string()
}
