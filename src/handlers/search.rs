//! Icon search endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};

use crate::error::{ApiError, ApiResult};
use crate::search::SearchQuery;
use crate::state::AppState;
use crate::utils::{envelope, new_request_id};
use crate::validator;

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

pub async fn search_icons(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    match search_icons_inner(state, &query).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn search_icons_inner(
    state: Arc<AppState>,
    query: &HashMap<String, String>,
) -> ApiResult<Response> {
    let text = query.get("q").cloned().unwrap_or_default();
    if text.len() > 200 {
        return Err(ApiError::InvalidParameter("query text too long".to_string()));
    }

    let source = query.get("source").cloned();
    if let Some(source) = &source {
        validator::validate_source(source)?;
    }
    let category = query.get("category").cloned();

    let limit = validator::parse_limit(query.get("limit").map(|s| s.as_str()), DEFAULT_LIMIT, MAX_LIMIT);
    let offset = validator::parse_offset(query.get("offset").map(|s| s.as_str()));

    let index = state
        .index_store
        .get_index()
        .await
        .map_err(|_| ApiError::StorageError("index store unavailable".to_string()))?;
    let inverted = state.index_store.get_inverted_index().await;
    let synonyms = state.index_store.get_synonyms().await;

    let search_query = SearchQuery {
        text,
        source,
        category,
        limit,
        offset,
    };

    let result = state.search_engine.search(
        &search_query,
        &index,
        inverted.as_deref(),
        synonyms.as_deref(),
    );

    let icons: Vec<_> = result
        .icons
        .iter()
        .map(|scored| {
            serde_json::json!({
                "id": scored.record.id,
                "name": scored.record.name,
                "source": scored.record.source,
                "category": scored.record.category,
                "tags": scored.record.tags,
                "score": scored.score,
            })
        })
        .collect();

    let request_id = new_request_id();
    let body = envelope(
        icons,
        &request_id,
        Some(serde_json::json!({
            "total": result.total,
            "limit": limit,
            "offset": offset,
            "hasMore": result.has_more,
            "searchMethod": result.search_method,
            "cacheHit": result.cache_hit,
        })),
    );

    Ok(axum::Json(body).into_response())
}
