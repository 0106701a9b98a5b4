//! Bounded background task queue and worker pool
//!
//! The background path (triage + durable writes, deep narrative refresh) is
//! detached from the fast path's lifetime: caller disconnects never cancel
//! it, and it never blocks a caller. Capacity is explicit - a full queue
//! drops the task with a logged warning instead of applying backpressure to
//! the fast path. Errors here are logged and counted, never propagated;
//! nobody is waiting.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::constants;
use crate::engine::narrative::NarrativeCache;
use crate::engine::planner::StrategyPlanner;
use crate::engine::router::HybridSearchRouter;
use crate::engine::triage::TriageClassifier;
use crate::engine::types::SearchResult;
use crate::engine::write_pipeline::MemoryWritePipeline;
use crate::metrics;
use crate::reasoner::{call_bounded, Reasoner};

#[derive(Debug)]
pub enum BackgroundTask {
    /// Classify a message and durably write it if memorable
    TriageAndWrite { user_id: String, message: String },
    /// Deep retrieval pass followed by narrative synthesis and cache refresh
    RefreshNarrative { user_id: String, message: String },
}

impl BackgroundTask {
    fn kind(&self) -> &'static str {
        match self {
            Self::TriageAndWrite { .. } => "triage_write",
            Self::RefreshNarrative { .. } => "narrative_refresh",
        }
    }
}

/// Everything a worker needs to process tasks
pub struct BackgroundContext {
    pub triage: Arc<TriageClassifier>,
    pub pipeline: Arc<MemoryWritePipeline>,
    pub planner: Arc<StrategyPlanner>,
    pub router: Arc<HybridSearchRouter>,
    pub narrative: Arc<NarrativeCache>,
    pub reasoner: Arc<dyn Reasoner>,
    pub config: EngineConfig,
}

pub struct BackgroundQueue {
    tx: mpsc::Sender<BackgroundTask>,
}

impl BackgroundQueue {
    /// Spawn the worker pool and return the enqueue handle.
    pub fn start(ctx: Arc<BackgroundContext>, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers.max(1) {
            let rx = rx.clone();
            let ctx = ctx.clone();
            tokio::spawn(worker_loop(worker_id, rx, ctx));
        }

        Self { tx }
    }

    /// Fire-and-forget enqueue. Returns false when the task was dropped
    /// because the queue is full or the workers have shut down.
    pub fn enqueue(&self, task: BackgroundTask) -> bool {
        let kind = task.kind();
        match self.tx.try_send(task) {
            Ok(()) => {
                metrics::BACKGROUND_QUEUE_DEPTH.inc();
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind, "Background queue full, dropping task");
                metrics::BACKGROUND_TASKS_DROPPED.inc();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(kind, "Background workers stopped, dropping task");
                metrics::BACKGROUND_TASKS_DROPPED.inc();
                false
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<BackgroundTask>>>,
    ctx: Arc<BackgroundContext>,
) {
    loop {
        let task = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };

        let Some(task) = task else {
            debug!(worker_id, "Background queue closed, worker exiting");
            break;
        };

        metrics::BACKGROUND_QUEUE_DEPTH.dec();
        let kind = task.kind();

        let outcome = tokio::time::timeout(
            ctx.config.background_task_deadline,
            handle_task(&ctx, task),
        )
        .await;

        let result_label = match outcome {
            Ok(Ok(())) => "ok",
            Ok(Err(e)) => {
                warn!(worker_id, kind, "Background task failed: {}", e);
                "error"
            }
            Err(_) => {
                warn!(
                    worker_id,
                    kind,
                    "Background task exceeded deadline {:?}",
                    ctx.config.background_task_deadline
                );
                "timeout"
            }
        };

        metrics::BACKGROUND_TASKS_TOTAL
            .with_label_values(&[kind, result_label])
            .inc();
    }
}

async fn handle_task(ctx: &BackgroundContext, task: BackgroundTask) -> anyhow::Result<()> {
    match task {
        BackgroundTask::TriageAndWrite { user_id, message } => {
            let decision = ctx.triage.classify(&message).await;
            if decision.remember {
                ctx.pipeline.accept(&decision, &user_id).await?;
            }
            Ok(())
        }
        BackgroundTask::RefreshNarrative { user_id, message } => {
            let decision = ctx.planner.deep_decision(&message).await;
            let results = ctx.router.execute(&user_id, &decision).await;

            if results.is_empty() {
                debug!(user_id, "No memories found, skipping narrative refresh");
                return Ok(());
            }

            let narrative = synthesize_narrative(ctx, &results).await;
            ctx.narrative
                .put(&user_id, narrative, ctx.config.narrative_ttl);
            Ok(())
        }
    }
}

/// Synthesize a user narrative from retrieved memories: reasoner when it
/// answers in time, deterministic summary otherwise. The background path
/// must not wedge on a dead model.
async fn synthesize_narrative(ctx: &BackgroundContext, results: &[SearchResult]) -> String {
    let top: Vec<&str> = results
        .iter()
        .take(20)
        .map(|r| r.content.as_str())
        .collect();

    let prompt = format!(
        "Write a concise third-person profile of this user from their stored memories. \
         Plain prose, at most 120 words, no preamble.\n\nMemories:\n{}",
        top.iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n")
    );

    match call_bounded(
        ctx.reasoner.as_ref(),
        "narrative",
        constants::NARRATIVE_SYNTHESIS_TIMEOUT,
        &prompt,
    )
    .await
    {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        _ => fallback_narrative(&top),
    }
}

fn fallback_narrative(contents: &[&str]) -> String {
    let mut narrative = String::from("Known about this user:\n");
    for content in contents.iter().take(10) {
        narrative.push_str("- ");
        narrative.push_str(content);
        narrative.push('\n');
    }
    narrative.trim_end().to_string()
}
