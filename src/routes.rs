//! Route table. Mounted once, identically, under both `/` and `/v1/` so
//! clients can pin to a version prefix or omit it.

use std::sync::Arc;

use axum::{
    Router,
    extract::Request,
    http::{Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::handlers;
use crate::middleware::{RequestIdLayer, rate_limit_layer, security_headers};
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

fn icon_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/icons/batch", post(handlers::batch_icons))
        .route("/icons/{name}", get(handlers::get_icon_default_source))
        .route("/icons/{source}/{name}", get(handlers::get_icon))
        .route("/search", get(handlers::search_icons))
        .route("/random", get(handlers::random_icons))
        .route("/sources", get(handlers::list_sources))
        .route("/categories", get(handlers::list_categories))
        .route("/bulk", post(handlers::bulk_download))
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::liveness))
        .route("/health/ready", get(handlers::readiness))
        .route("/metrics", get(handlers::get_metrics))
        .route("/metrics/prometheus", get(handlers::get_metrics_prometheus))
}

/// Build the full router, with the versioned routes nested at both `/`
/// and `/v1`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = icon_routes().merge(health_routes());

    let cors = build_cors_layer(&state.config.allowed_origins_list());
    let trust_request_id = state.config.trust_request_id.clone();
    let rate_limiter = Arc::clone(&state.rate_limiter);

    Router::new()
        .merge(api.clone())
        .nest("/v1", api)
        .fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_layer))
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .layer(RequestIdLayer::new(trust_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(tower_http::cors::Any)
    }
}

async fn not_found_handler(req: Request) -> impl IntoResponse {
    not_found(req.uri().clone()).await
}

async fn not_found(uri: Uri) -> Response {
    tracing::warn!(path = %uri.path(), "route not found");
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({
            "error": {
                "code": "NOT_FOUND",
                "message": "not found",
            },
            "meta": {
                "timestamp": crate::utils::now_iso8601(),
            }
        })),
    )
        .into_response()
}
