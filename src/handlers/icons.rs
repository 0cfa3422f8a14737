//! Single-icon serving: resolve an icon record, fetch its source SVG,
//! apply the requested transform, and serve it with full HTTP caching.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::cache::{apply_cache_headers, etag_matches, icon_cache_key};
use crate::error::{ApiError, ApiResult};
use crate::models::{IconRecord, TransformParams, Variant};
use crate::sources;
use crate::state::AppState;
use crate::utils::{envelope, new_request_id};
use crate::validator;

pub fn build_params(query: &HashMap<String, String>) -> ApiResult<TransformParams> {
    let size = validator::parse_size(query.get("size").map(|s| s.as_str()))?;
    let stroke_width = validator::parse_stroke_width(
        query
            .get("strokeWidth")
            .or_else(|| query.get("stroke"))
            .map(|s| s.as_str()),
    )?;
    let color = validator::parse_color(query.get("color").map(|s| s.as_str()))?;
    let rotate = validator::parse_rotate(query.get("rotate").map(|s| s.as_str()))?;
    let mirror = validator::parse_mirror(query.get("mirror").map(|s| s.as_str()));
    let class_name = query.get("class").cloned();

    let mut custom_attributes = Vec::new();
    for (key, value) in query {
        if let Some(attr_name) = key.strip_prefix("attr.") {
            validator::validate_custom_attribute(attr_name, value)?;
            custom_attributes.push((attr_name.to_string(), value.clone()));
        }
    }

    Ok(TransformParams {
        size,
        stroke_width,
        color,
        rotate,
        mirror,
        class_name,
        custom_attributes,
    })
}

/// `GET /icons/{source}/{name}`.
pub async fn get_icon(
    State(state): State<Arc<AppState>>,
    Path((source, name)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    match get_icon_inner(state, &source, &name, &query, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// `GET /icons/{name}`, `source` defaulting to [`sources::DEFAULT_SOURCE`].
pub async fn get_icon_default_source(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let source = query
        .get("source")
        .cloned()
        .unwrap_or_else(|| sources::DEFAULT_SOURCE.to_string());
    match get_icon_inner(state, &source, &name, &query, &headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

pub(crate) fn wants_svg(query: &HashMap<String, String>, headers: &HeaderMap) -> bool {
    if query.get("format").is_some_and(|f| f == "svg") {
        return true;
    }
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("image/svg+xml"))
}

async fn get_icon_inner(
    state: Arc<AppState>,
    source: &str,
    name: &str,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let start = Instant::now();

    let variant = query
        .get("variant")
        .map(|s| Variant::parse(s).ok_or_else(|| ApiError::InvalidParameter(format!("invalid variant: '{s}'"))))
        .transpose()?
        .unwrap_or(Variant::Default);

    let params = build_params(query)?;

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let (svg, _cache_key, cache_status, record) =
        resolve_icon_svg(&state, source, name, variant, &params).await?;

    Ok(build_response(
        &svg,
        source,
        name,
        &record,
        variant,
        cache_status,
        "memory",
        if_none_match.as_deref(),
        start,
        wants_svg(query, headers),
    ))
}

/// Resolve one icon's transformed SVG body, going through the memory
/// cache and request coalescer. Shared by the single-icon, batch, and
/// bulk endpoints. Returns `(svg, cache_key, "HIT" | "MISS", record)`.
pub async fn resolve_icon_svg(
    state: &Arc<AppState>,
    source: &str,
    name: &str,
    variant: Variant,
    params: &TransformParams,
) -> ApiResult<(Arc<str>, String, &'static str, IconRecord)> {
    validator::validate_source(source)?;
    validator::validate_name(name)?;

    let index = state
        .index_store
        .get_index()
        .await
        .map_err(|_| ApiError::StorageError("index store unavailable".to_string()))?;

    let record = index.get(source, name).ok_or_else(|| {
        let suggestions = suggest_similar(&index, source, name);
        ApiError::IconNotFound {
            source: source.to_string(),
            name: name.to_string(),
            suggestions,
        }
    })?;
    let record = record.clone();

    let variant_suffix = sources::variant_path_suffix(source, variant).ok_or_else(|| {
        ApiError::VariantNotAvailable {
            source: source.to_string(),
            variant: variant.as_str().to_string(),
            not_found: false,
        }
    })?;

    let blob_key = format!("{}{}", record.path, variant_suffix);
    let cache_key = icon_cache_key(
        source,
        name,
        variant.as_str(),
        params.size,
        params.stroke_width,
        &params.color,
        params.rotate,
        params.mirror,
        params.class_name.as_deref(),
    );

    if let Some(cached) = state.memory_cache.get(&cache_key) {
        state.metrics.incr("icon_cache_hit_total");
        return Ok((cached, cache_key, "HIT", record));
    }
    state.metrics.incr("icon_cache_miss_total");

    let blob_store = Arc::clone(&state.blob_store);
    let transform_cache = Arc::clone(&state.transform_cache);
    let params_for_compute = params.clone();
    let blob_key_for_compute = blob_key.clone();

    let result = state
        .coalescer
        .run(&cache_key, move || async move {
            let outcome = blob_store
                .get(&blob_key_for_compute, None)
                .await
                .map_err(|e| e.to_string())?;
            match outcome {
                crate::blob_store::GetOutcome::Hit(blob) => {
                    let (output, _etag) = transform_cache.get_or_compute(&blob.body, &params_for_compute);
                    Ok((output, String::new()))
                }
                _ => Err("not_found".to_string()),
            }
        })
        .await;

    let (svg, _) = result.map_err(|e| {
        if e == "not_found" {
            ApiError::IconNotFound {
                source: source.to_string(),
                name: name.to_string(),
                suggestions: Vec::new(),
            }
        } else {
            ApiError::StorageError(e)
        }
    })?;

    state.memory_cache.insert(cache_key.clone(), svg.clone());

    Ok((svg, cache_key, "MISS", record))
}

fn suggest_similar(index: &crate::models::IconIndex, source: &str, name: &str) -> Vec<String> {
    index
        .icons
        .values()
        .filter(|r| r.source == source && levenshtein_close(&r.name, name))
        .take(3)
        .map(|r| r.name.clone())
        .collect()
}

fn levenshtein_close(a: &str, b: &str) -> bool {
    a.starts_with(&b[..b.len().min(3)]) || b.starts_with(&a[..a.len().min(3)])
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn build_response(
    svg: &str,
    source: &str,
    name: &str,
    record: &IconRecord,
    variant: Variant,
    cache_status: &str,
    cache_layer: &str,
    if_none_match: Option<&str>,
    start: Instant,
    wants_svg: bool,
) -> Response {
    let etag = format!("\"{:x}\"", md5_like_hash(svg));
    let elapsed = start.elapsed().as_millis() as u64;
    let cache_tag = format!("icon:{source}:{name},source:{source},variant:{}", variant.as_str());

    if etag_matches(if_none_match, &etag) {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        apply_cache_headers(
            response.headers_mut(),
            &etag,
            &cache_tag,
            "HIT",
            cache_layer,
            elapsed,
        );
        return response;
    }

    if wants_svg {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "image/svg+xml; charset=utf-8".parse().unwrap());
        apply_cache_headers(&mut headers, &etag, &cache_tag, cache_status, cache_layer, elapsed);
        return (StatusCode::OK, headers, svg.to_string()).into_response();
    }

    let license = sources::get(source).map(|config| serde_json::to_value(&config.license).unwrap_or_default());
    let variants: Vec<&str> = record.variants.iter().map(Variant::as_str).collect();
    let data = serde_json::json!({
        "name": record.name,
        "source": source,
        "variant": variant.as_str(),
        "category": record.category,
        "tags": record.tags,
        "svg": svg,
        "variants": variants,
        "license": license,
    });

    let request_id = new_request_id();
    let body = envelope(data, &request_id, None);

    let mut response = axum::Json(body).into_response();
    apply_cache_headers(response.headers_mut(), &etag, &cache_tag, cache_status, cache_layer, elapsed);
    response
}

fn md5_like_hash(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}
