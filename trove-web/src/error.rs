//! JSON envelope and error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use trove_core::{ResolveError, SourceError};

/// Successful response body: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`
    pub success: bool,
    /// Response payload
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wraps `data` in a success envelope.
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Errors returned to HTTP clients as `{"success": false, "error": ...}`.
///
/// Messages name the item but never the filesystem layout.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Item, file or match does not exist.
    #[error("{message}")]
    NotFound {
        /// Client-visible message
        message: String,
    },

    /// Library or catalog is not configured yet.
    #[error("{message}")]
    Unavailable {
        /// Client-visible message
        message: String,
    },

    /// Anything else.
    #[error("{message}")]
    Internal {
        /// Client-visible message
        message: String,
    },
}

impl ApiError {
    /// 404 with `message`.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// 500 with `message`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::Unconfigured { .. } => ApiError::Unavailable {
                message: "Library is not configured".to_string(),
            },
            SourceError::InvalidId { id } => ApiError::not_found(format!("Item not found: {id}")),
            SourceError::Upstream { .. } => ApiError::internal("Catalog request failed"),
            SourceError::Io { .. } => ApiError::internal("Failed to read library"),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::NotFound { id } => ApiError::not_found(format!("Item not found: {id}")),
            ResolveError::PayloadMissing { id, .. } => {
                ApiError::not_found(format!("File not found for item: {id}"))
            }
            ResolveError::Source(e) => e.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
