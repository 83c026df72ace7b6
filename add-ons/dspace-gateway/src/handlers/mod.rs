//! HTTP handlers: `chat` serves the visitor widget, `admin` the admin panel.

pub(crate) mod admin;
pub(crate) mod chat;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dspace_core::{CatalogError, StoreError};

/// Admin failure rendered as `{"success": false, "error": ...}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Validation(msg) => Self::new(StatusCode::BAD_REQUEST, msg),
            CatalogError::NotFound(msg) => Self::new(StatusCode::NOT_FOUND, msg),
            CatalogError::Conflict(msg) => Self::new(StatusCode::CONFLICT, msg),
            CatalogError::Store(_) => {
                tracing::error!(target: "dspace::gateway", error = %e, "catalog save failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::error!(target: "dspace::gateway", error = %e, "storage error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            axum::Json(serde_json::json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;
