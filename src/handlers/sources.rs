//! List configured icon sources with their live icon counts.

use std::sync::Arc;

use axum::{extract::State, response::{IntoResponse, Response}};

use crate::error::{ApiError, ApiResult};
use crate::sources;
use crate::state::AppState;
use crate::utils::{envelope, new_request_id};

pub async fn list_sources(State(state): State<Arc<AppState>>) -> Response {
    match list_sources_inner(state).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn list_sources_inner(state: Arc<AppState>) -> ApiResult<Response> {
    let index = state
        .index_store
        .get_index()
        .await
        .map_err(|_| ApiError::StorageError("index store unavailable".to_string()))?;

    let list = sources::list_with_counts(&index);
    let request_id = new_request_id();
    Ok(axum::Json(envelope(list, &request_id, None)).into_response())
}
