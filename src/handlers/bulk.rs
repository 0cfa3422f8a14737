//! `POST /bulk`: resolve many icons and compose them into a single
//! downloadable archive (zip, SVG sprite, or JSON sprite).

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::batch::{BulkFormat, BulkIcon, compose_json_sprite, compose_svg_bundle, compose_zip, validate_bulk_size};
use crate::error::{ApiError, ApiResult};
use crate::handlers::icons::resolve_icon_svg;
use crate::models::{TransformParams, Variant};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkRequestItem {
    pub source: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub icons: Vec<BulkRequestItem>,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "zip".to_string()
}

pub async fn bulk_download(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkRequest>,
) -> Response {
    match bulk_download_inner(state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn bulk_download_inner(state: Arc<AppState>, request: BulkRequest) -> ApiResult<Response> {
    validate_bulk_size(request.icons.len())?;
    let format = BulkFormat::parse(&request.format)
        .ok_or_else(|| ApiError::InvalidFormat(format!("unknown bulk format: '{}'", request.format)))?;

    let default_params = TransformParams {
        size: 24,
        stroke_width: 2.0,
        color: "currentColor".to_string(),
        rotate: None,
        mirror: false,
        class_name: None,
        custom_attributes: Vec::new(),
    };

    let mut icons = Vec::with_capacity(request.icons.len());
    for item in request.icons {
        let (svg, _, _, _) =
            resolve_icon_svg(&state, &item.source, &item.name, Variant::Default, &default_params).await?;
        icons.push(BulkIcon {
            source: item.source,
            name: item.name,
            svg: svg.to_string(),
        });
    }

    if icons.is_empty() {
        return Err(ApiError::NoValidIcons);
    }

    let (body, content_type): (Vec<u8>, &'static str) = match format {
        BulkFormat::Zip => (compose_zip(&icons)?, format.content_type()),
        BulkFormat::SvgBundle => (compose_svg_bundle(&icons).into_bytes(), format.content_type()),
        BulkFormat::JsonSprite => (
            serde_json::to_vec(&compose_json_sprite(&icons)).map_err(|e| ApiError::InternalError(e.to_string()))?,
            format.content_type(),
        ),
    };

    let mut response = (StatusCode::OK, Body::from(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!(
            "attachment; filename=\"icons.{}\"",
            format.file_extension()
        ))
        .unwrap_or(HeaderValue::from_static("attachment")),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(response)
}
