//! HTTP error type for the API handlers.
//!
//! Every variant renders as
//! `{"success": false, "error": {"code": ..., "message": ..., "details": ...}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Invalid request (400).
    BadRequest(String),
    /// Unknown resource (404).
    NotFound(String),
    /// The embedding provider failed (502). Safe to retry.
    Embedding(String),
    /// Unexpected server error (500). The message is generic; `details` holds the cause.
    Internal { message: String, details: String },
}

impl ApiError {
    pub fn internal(message: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        ApiError::Internal {
            message: message.into(),
            details: cause.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Embedding(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Embedding(_) => "EMBEDDING_ERROR",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Embedding(msg) => {
                write!(f, "{}: {msg}", self.code())
            }
            ApiError::Internal { message, details } => {
                write!(f, "{}: {message} ({details})", self.code())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let error = match self {
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Embedding(message) => json!({ "code": code, "message": message }),
            ApiError::Internal { message, details } => {
                json!({ "code": code, "message": message, "details": details })
            }
        };
        (status, Json(json!({ "success": false, "error": error }))).into_response()
    }
}
