//! List icon categories, aggregated from the current icon index.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{extract::State, response::{IntoResponse, Response}};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::utils::{envelope, new_request_id};

pub async fn list_categories(State(state): State<Arc<AppState>>) -> Response {
    match list_categories_inner(state).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn list_categories_inner(state: Arc<AppState>) -> ApiResult<Response> {
    let index = state
        .index_store
        .get_index()
        .await
        .map_err(|_| ApiError::StorageError("index store unavailable".to_string()))?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in index.icons.values() {
        *counts.entry(record.category.as_str()).or_insert(0) += 1;
    }

    let mut categories: Vec<_> = counts
        .into_iter()
        .map(|(name, count)| serde_json::json!({ "name": name, "count": count }))
        .collect();
    categories.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    let request_id = new_request_id();
    Ok(axum::Json(envelope(categories, &request_id, None)).into_response())
}
