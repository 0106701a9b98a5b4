//! Health, readiness, and metrics endpoints
//!
//! These stay public (no auth, no rate limit): Kubernetes probes and
//! Prometheus scrapers must always get through.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use super::state::SharedState;
use crate::stores::CircuitState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub store: String,
    pub circuit: String,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub stores: Vec<StoreHealth>,
}

/// GET /health - basic liveness + version info
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

/// GET /health/live - Kubernetes liveness probe
pub async fn health_live() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready - Kubernetes readiness probe
///
/// Reports degraded (still 200 - partial results are a valid serving state)
/// when any circuit breaker is open.
pub async fn health_ready(State(state): State<SharedState>) -> Json<ReadyResponse> {
    let stores: Vec<StoreHealth> = state
        .orchestrator
        .router()
        .circuit_states()
        .into_iter()
        .map(|(kind, circuit)| StoreHealth {
            store: kind.to_string(),
            circuit: circuit.to_string(),
        })
        .collect();

    let any_open = stores
        .iter()
        .any(|s| s.circuit == CircuitState::Open.to_string());

    Json(ReadyResponse {
        status: if any_open { "degraded" } else { "ready" },
        stores,
    })
}

/// GET /metrics - Prometheus text exposition
pub async fn metrics_endpoint() -> Result<String, StatusCode> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let metric_families = crate::metrics::METRICS_REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
