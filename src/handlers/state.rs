//! Shared application state for the HTTP layer

use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::engine::Orchestrator;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: ServerConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, config: ServerConfig) -> Self {
        Self {
            orchestrator,
            config,
            started_at: Instant::now(),
        }
    }
}

/// Application state type alias
pub type SharedState = Arc<AppState>;
