//! Return a single random icon, transformed the same way as `GET /icons/{name}`,
//! optionally filtered by source or category.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use rand::seq::SliceRandom;

use crate::error::{ApiError, ApiResult};
use crate::handlers::icons::{build_params, build_response, resolve_icon_svg, wants_svg};
use crate::models::Variant;
use crate::state::AppState;
use crate::validator;

pub async fn random_icons(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    match random_icons_inner(state, &query, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn random_icons_inner(
    state: Arc<AppState>,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let start = Instant::now();

    let source = query.get("source").cloned();
    if let Some(source) = &source {
        validator::validate_source(source)?;
    }
    let category = query.get("category").cloned();

    let index = state
        .index_store
        .get_index()
        .await
        .map_err(|_| ApiError::StorageError("index store unavailable".to_string()))?;

    let candidates: Vec<_> = index
        .icons
        .values()
        .filter(|r| source.as_deref().is_none_or(|s| s == r.source))
        .filter(|r| category.as_deref().is_none_or(|c| c == r.category))
        .collect();

    let mut rng = rand::rng();
    let picked = candidates.choose(&mut rng).ok_or(ApiError::NotFound)?;

    let variant = query
        .get("variant")
        .map(|s| Variant::parse(s).ok_or_else(|| ApiError::InvalidParameter(format!("invalid variant: '{s}'"))))
        .transpose()?
        .unwrap_or(Variant::Default);

    let params = build_params(query)?;

    let (svg, _cache_key, cache_status, record) =
        resolve_icon_svg(&state, &picked.source, &picked.name, variant, &params).await?;

    Ok(build_response(
        &svg,
        &picked.source,
        &picked.name,
        &record,
        variant,
        cache_status,
        "memory",
        None,
        start,
        wants_svg(query, headers),
    ))
}
