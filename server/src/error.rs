//! Mapping from store and request failures to HTTP responses.
//!
//! Errors are logged here, once, at the point they become a response.
//! Client-facing bodies are `{"error": "..."}` and never carry SQL text or
//! file paths for server-side failures.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use todo_core::StoreError;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body or path could not be parsed.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::StorageUnavailable(_) | StoreError::Storage(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Store(StoreError::Validation(msg)) => msg.clone(),
            ApiError::Store(StoreError::NotFound(_)) => "todo not found".to_string(),
            ApiError::Store(_) => "internal server error".to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::BadRequest("invalid todo id".to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, %status, "request rejected");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
