//! Error registry: one `thiserror` variant per stable code, with HTTP
//! status, client-exposure, and log level baked in.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidParameter(String),
    #[error("{0}")]
    InvalidSize(String),
    #[error("{0}")]
    InvalidColor(String),
    #[error("{0}")]
    InvalidFormat(String),
    #[error("batch of {requested} icons exceeds the limit of {max}")]
    BatchLimitExceeded { requested: usize, max: usize },
    #[error("bulk request of {requested} icons exceeds the limit of {max}")]
    BulkLimitExceeded { requested: usize, max: usize },
    #[error("no valid icons in request")]
    NoValidIcons,
    #[error("variant '{variant}' is not available for source '{source}'")]
    VariantNotAvailable {
        source: String,
        variant: String,
        /// When true, surfaced as 404; otherwise 400.
        not_found: bool,
    },
    #[error("icon '{source}:{name}' not found")]
    IconNotFound {
        source: String,
        name: String,
        suggestions: Vec<String>,
    },
    #[error("category '{0}' not found")]
    CategoryNotFound(String),
    #[error("not found")]
    NotFound,
    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameter(_)
            | ApiError::InvalidSize(_)
            | ApiError::InvalidColor(_)
            | ApiError::InvalidFormat(_)
            | ApiError::BatchLimitExceeded { .. }
            | ApiError::BulkLimitExceeded { .. }
            | ApiError::NoValidIcons => StatusCode::BAD_REQUEST,
            ApiError::VariantNotAvailable { not_found, .. } => {
                if *not_found {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            ApiError::IconNotFound { .. } | ApiError::CategoryNotFound(_) | ApiError::NotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidParameter(_) => "INVALID_PARAMETER",
            ApiError::InvalidSize(_) => "INVALID_SIZE",
            ApiError::InvalidColor(_) => "INVALID_COLOR",
            ApiError::InvalidFormat(_) => "INVALID_FORMAT",
            ApiError::BatchLimitExceeded { .. } => "BATCH_LIMIT_EXCEEDED",
            ApiError::BulkLimitExceeded { .. } => "BULK_LIMIT_EXCEEDED",
            ApiError::NoValidIcons => "NO_VALID_ICONS",
            ApiError::VariantNotAvailable { .. } => "VARIANT_NOT_AVAILABLE",
            ApiError::IconNotFound { .. } => "ICON_NOT_FOUND",
            ApiError::CategoryNotFound(_) => "CATEGORY_NOT_FOUND",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
            ApiError::StorageError(_) => "STORAGE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn exposed(&self) -> bool {
        !matches!(self, ApiError::InternalError(_))
    }

    pub fn level(&self) -> LogLevel {
        match self {
            ApiError::InvalidParameter(_)
            | ApiError::InvalidSize(_)
            | ApiError::InvalidColor(_)
            | ApiError::InvalidFormat(_)
            | ApiError::BatchLimitExceeded { .. }
            | ApiError::BulkLimitExceeded { .. }
            | ApiError::NoValidIcons
            | ApiError::VariantNotAvailable { .. }
            | ApiError::IconNotFound { .. }
            | ApiError::CategoryNotFound(_)
            | ApiError::NotFound => LogLevel::Info,
            ApiError::RateLimited { .. } => LogLevel::Warn,
            ApiError::StorageError(_) | ApiError::InternalError(_) => LogLevel::Error,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::IconNotFound { suggestions, .. } if !suggestions.is_empty() => {
                Some(json!({ "suggestions": suggestions }))
            }
            _ => None,
        }
    }

    fn message(&self) -> String {
        if self.exposed() {
            self.to_string()
        } else {
            "An unexpected error occurred".to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = format!("req_{}", uuid::Uuid::new_v4());

        match self.level() {
            LogLevel::Info => tracing::info!(code = self.code(), request_id, "{}", self),
            LogLevel::Warn => tracing::warn!(code = self.code(), request_id, "{}", self),
            LogLevel::Error => tracing::error!(code = self.code(), request_id, "{}", self),
        }

        let mut error_body = json!({
            "code": self.code(),
            "message": self.message(),
        });
        if let Some(details) = self.details() {
            error_body["details"] = details;
        }

        let body = json!({
            "error": error_body,
            "meta": {
                "request_id": request_id,
                "timestamp": crate::utils::now_iso8601(),
            }
        });

        let status = self.status();
        let mut response = (status, Json(body)).into_response();

        if let ApiError::RateLimited { retry_after_secs } = &self {
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from_str(&retry_after_secs.to_string()).unwrap(),
            );
        }

        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
