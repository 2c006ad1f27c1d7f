//! Error handling for the API server

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sigsync::{LocalStoreError, SigsyncError, TemplateError};
use thiserror::Error;

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Sync error: {0}")]
    Sync(#[from] SigsyncError),

    #[error("Local storage error: {0}")]
    Local(#[from] LocalStoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TemplateError> for ApiError {
    fn from(err: TemplateError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::TemplateNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Sync(SigsyncError::Template(ref e)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
            ),
            ApiError::Local(_) | ApiError::Sync(SigsyncError::Local(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Local storage error".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Convenience functions for common errors
impl ApiError {
    pub fn template_not_found(name: &str) -> Self {
        Self::TemplateNotFound(name.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        Self::Validation(msg.to_string())
    }

    pub fn internal(msg: &str) -> Self {
        Self::Internal(msg.to_string())
    }
}
