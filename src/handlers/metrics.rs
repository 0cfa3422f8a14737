//! Expose the in-process metrics registry, in JSON or Prometheus text
//! depending on the caller's `Accept` header.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

pub async fn get_metrics(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let wants_prometheus = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/plain"));

    if wants_prometheus {
        prometheus_response(&state)
    } else {
        axum::Json(state.metrics.to_json()).into_response()
    }
}

/// Dedicated Prometheus-format endpoint, independent of content negotiation.
pub async fn get_metrics_prometheus(State(state): State<Arc<AppState>>) -> Response {
    prometheus_response(&state)
}

fn prometheus_response(state: &Arc<AppState>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus_text(),
    )
        .into_response()
}
