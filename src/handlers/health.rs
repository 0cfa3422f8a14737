//! Liveness and readiness probes.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::circuit_breaker::CircuitState;
use crate::state::AppState;

/// `GET /health/live`: process is up and serving. Always 200 once bound.
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// `GET /health/ready`: backend dependencies are reachable.
pub async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let healthy = state.health_checker.check().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, if healthy { "OK" } else { "Unhealthy" })
}

/// `GET /health`: detailed status, including circuit breaker state for
/// each backend dependency.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let healthy = state.health_checker.check().await;
    let index_state = state.index_store.circuit_state();
    let blob_state = state.blob_store.circuit_state();

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if healthy { "ok" } else { "degraded" },
        "dependencies": {
            "index_store": circuit_label(index_state),
            "blob_store": circuit_label(blob_state),
        },
    });

    (status, axum::Json(body))
}

fn circuit_label(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "closed",
        CircuitState::HalfOpen => "half_open",
        CircuitState::Open => "open",
    }
}
