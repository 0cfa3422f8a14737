//! `POST /icons/batch`: resolve many icons in one request, with per-icon
//! errors reported in-band rather than failing the whole request.

use std::sync::Arc;

use axum::{Json, extract::State, response::{IntoResponse, Response}};
use serde::Deserialize;

use crate::batch::{BatchItemError, BatchItemResult, validate_batch_size};
use crate::error::{ApiError, ApiResult};
use crate::handlers::icons::resolve_icon_svg;
use crate::models::{TransformParams, Variant};
use crate::state::AppState;
use crate::utils::{envelope, new_request_id};

#[derive(Debug, Deserialize)]
pub struct BatchRequestItem {
    pub source: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(rename = "strokeWidth", default)]
    pub stroke_width: Option<f64>,
    #[serde(default)]
    pub variant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub icons: Vec<BatchRequestItem>,
}

pub async fn batch_icons(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Response {
    match batch_icons_inner(state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn batch_icons_inner(state: Arc<AppState>, request: BatchRequest) -> ApiResult<Response> {
    validate_batch_size(request.icons.len())?;

    let mut results = Vec::with_capacity(request.icons.len());
    for item in request.icons {
        results.push(resolve_one(&state, item).await);
    }

    let request_id = new_request_id();
    Ok(Json(envelope(results, &request_id, None)).into_response())
}

async fn resolve_one(state: &Arc<AppState>, item: BatchRequestItem) -> BatchItemResult {
    let variant = match item.variant.as_deref() {
        Some(v) => match Variant::parse(v) {
            Some(variant) => variant,
            None => {
                return BatchItemResult {
                    source: item.source,
                    name: item.name,
                    svg: None,
                    error: Some(BatchItemError::from(ApiError::InvalidParameter(format!(
                        "invalid variant: '{v}'"
                    )))),
                };
            }
        },
        None => Variant::Default,
    };

    let size = item.size.unwrap_or(24);
    if !(8..=512).contains(&size) {
        return BatchItemResult {
            source: item.source,
            name: item.name,
            svg: None,
            error: Some(BatchItemError::from(ApiError::InvalidSize(format!(
                "size must be between 8 and 512, got {size}"
            )))),
        };
    }
    let stroke_width = item.stroke_width.unwrap_or(2.0);
    if !(0.5..=3.0).contains(&stroke_width) {
        return BatchItemResult {
            source: item.source,
            name: item.name,
            svg: None,
            error: Some(BatchItemError::from(ApiError::InvalidParameter(format!(
                "stroke width must be between 0.5 and 3, got {stroke_width}"
            )))),
        };
    }

    let params = TransformParams {
        size,
        stroke_width,
        color: item.color.unwrap_or_else(|| "currentColor".to_string()),
        rotate: None,
        mirror: false,
        class_name: None,
        custom_attributes: Vec::new(),
    };

    match resolve_icon_svg(state, &item.source, &item.name, variant, &params).await {
        Ok((svg, _, _, _)) => BatchItemResult {
            source: item.source,
            name: item.name,
            svg: Some(svg.to_string()),
            error: None,
        },
        Err(e) => BatchItemResult {
            source: item.source,
            name: item.name,
            svg: None,
            error: Some(BatchItemError::from(e)),
        },
    }
}
