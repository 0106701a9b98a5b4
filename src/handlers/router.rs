//! Router Configuration - Centralized route definitions
//!
//! Routes are split into public (no auth) and protected (auth required).
//! Auth middleware and rate limiting are applied by the caller (main.rs).

use axum::{
    routing::{get, post},
    Router,
};

use super::state::SharedState;
use super::{context, health};

/// Build the public routes (no authentication required)
///
/// These routes must always be accessible for:
/// - Health checks (Kubernetes probes)
/// - Metrics (Prometheus scraping)
pub fn build_public_routes(state: SharedState) -> Router {
    Router::new()
        // =================================================================
        // HEALTH & KUBERNETES PROBES
        // =================================================================
        .route("/health", get(health::health))
        .route("/health/live", get(health::health_live))
        .route("/health/ready", get(health::health_ready))
        // =================================================================
        // METRICS (PROMETHEUS)
        // =================================================================
        .route("/metrics", get(health::metrics_endpoint))
        // =================================================================
        // STATE
        // =================================================================
        .with_state(state)
}

/// Build the protected API routes (authentication required)
pub fn build_protected_routes(state: SharedState) -> Router {
    Router::new()
        // =================================================================
        // CONTEXT ORCHESTRATION
        // =================================================================
        .route("/api/context", post(context::process_message))
        // =================================================================
        // EXPLICIT REMEMBER & READS
        // =================================================================
        .route("/api/remember", post(context::remember))
        .route(
            "/api/memory/{user_id}/{memory_id}",
            get(context::get_memory),
        )
        // =================================================================
        // STATE
        // =================================================================
        .with_state(state)
}

/// Build the complete router with both public and protected routes
///
/// Note: This function does NOT apply auth middleware or rate limiting.
/// The caller (main.rs) should apply those layers as needed.
pub fn build_router(state: SharedState) -> Router {
    let public = build_public_routes(state.clone());
    let protected = build_protected_routes(state);

    Router::new().merge(public).merge(protected)
}
