//! Status and health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;

/// Root status payload, kept for browser UIs probing the relay
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub websocket: &'static str,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
    pub active_sessions: usize,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub inference: CheckResult,
    pub synthesis: CheckResult,
}

/// Result of a single readiness check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    pub service: &'static str,
}

impl CheckResult {
    const fn ok(service: &'static str) -> Self {
        Self { status: "ok", service }
    }
}

async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        websocket: "/ws",
    })
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe
///
/// Service clients are built and validated before the listener binds, so
/// a running server always has both; the check reports which ones.
async fn ready(State(state): State<Arc<ApiState>>) -> Json<ReadinessResponse> {
    let (inference, synthesis) = state.orchestrator.service_names();
    let active_sessions = state.sessions.read().await.len();

    Json(ReadinessResponse {
        status: "ok",
        checks: ReadinessChecks {
            inference: CheckResult::ok(inference),
            synthesis: CheckResult::ok(synthesis),
        },
        active_sessions,
    })
}

/// Build health router (no state needed)
pub fn router() -> Router {
    Router::new()
        .route("/", get(status))
        .route("/health", get(health))
}

/// Build readiness router (needs state for checks)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
