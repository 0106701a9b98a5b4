//! Context and memory endpoints
//!
//! Thin axum handlers over the orchestrator: the engine does the work, these
//! validate, translate, and serialize.

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::state::SharedState;
use crate::engine::types::{Memory, MemoryPriority, MemorySource};
use crate::errors::{AppError, ValidationErrorExt};
use crate::validation;

fn default_true() -> bool {
    true
}

// =============================================================================
// PROCESS MESSAGE
// =============================================================================

/// POST /api/context request body
#[derive(Debug, Deserialize)]
pub struct ProcessMessageRequest {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub is_new_conversation: bool,
    #[serde(default = "default_true")]
    pub needs_context: bool,
}

#[derive(Debug, Serialize)]
pub struct ProcessMessageResponse {
    /// Synthesized context block; empty means "no relevant context"
    pub context_text: String,
    pub strategy_used: String,
    pub elapsed_ms: u64,
}

/// POST /api/context - the engine's one logical operation
pub async fn process_message(
    State(state): State<SharedState>,
    Json(req): Json<ProcessMessageRequest>,
) -> Result<Json<ProcessMessageResponse>, AppError> {
    let start = Instant::now();

    let result = state
        .orchestrator
        .process_message(
            &req.user_id,
            &req.message,
            req.is_new_conversation,
            req.needs_context,
        )
        .await?;

    Ok(Json(ProcessMessageResponse {
        context_text: result.context_text,
        strategy_used: result.strategy_used,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }))
}

// =============================================================================
// EXPLICIT REMEMBER
// =============================================================================

/// POST /api/remember request body
///
/// Bypasses triage: the client has already decided this is worth storing.
#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RememberResponse {
    /// Id of the stored memory; absent when the content deduplicated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_id: Option<String>,
    pub deduplicated: bool,
}

/// POST /api/remember - direct durable write through the pipeline
pub async fn remember(
    State(state): State<SharedState>,
    Json(req): Json<RememberRequest>,
) -> Result<Json<RememberResponse>, AppError> {
    validation::validate_user_id(&req.user_id).map_validation_err("user_id")?;
    validation::validate_message(&req.content).map_validation_err("content")?;
    validation::validate_tags(&req.tags).map_validation_err("tags")?;

    let mut memory = Memory::new(&req.user_id, &req.content, &req.content);
    memory.tags = req.tags;
    memory.source = MemorySource::Explicit;
    if let Some(priority) = &req.priority {
        memory.priority = MemoryPriority::parse(priority);
    }

    let written = state.orchestrator.pipeline().write(memory).await?;

    Ok(Json(match written {
        Some(memory) => RememberResponse {
            memory_id: Some(memory.id.to_string()),
            deduplicated: false,
        },
        None => RememberResponse {
            memory_id: None,
            deduplicated: true,
        },
    }))
}

// =============================================================================
// MEMORY READ
// =============================================================================

/// GET /api/memory/{user_id}/{memory_id} - source-of-truth read
pub async fn get_memory(
    State(state): State<SharedState>,
    Path((user_id, memory_id)): Path<(String, String)>,
) -> Result<Json<Memory>, AppError> {
    validation::validate_user_id(&user_id).map_validation_err("user_id")?;
    let parsed = validation::validate_memory_id(&memory_id).map_validation_err("memory_id")?;

    let memory = state
        .orchestrator
        .pipeline()
        .get(&user_id, &crate::engine::types::MemoryId(parsed))
        .await?;

    memory
        .filter(|m| !m.deleted)
        .map(Json)
        .ok_or(AppError::MemoryNotFound(memory_id))
}
