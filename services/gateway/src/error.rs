//! API error responses
//!
//! Core errors map onto HTTP status codes here; handlers add the two
//! concerns the core does not know about, authentication and admin gating.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use farmchain_core::Error as CoreError;

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Error surface of the gateway
#[derive(Debug)]
pub enum ApiError {
    /// An error raised by the core ledger, storage, or mock chain
    Core(CoreError),
    /// Missing or invalid credentials
    Unauthenticated(String),
    /// Authenticated but not allowed
    Forbidden(String),
    /// Malformed request before it reaches the core
    BadRequest(String),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Core(err) => match err {
                CoreError::Validation(_) | CoreError::IllegalTransition { .. } => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CoreError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                CoreError::Authorization(_) => (StatusCode::FORBIDDEN, err.to_string()),
                CoreError::Conflict(_) => (StatusCode::CONFLICT, err.to_string()),
                _ => {
                    tracing::error!(error = %err, "Internal error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        (
            status,
            Json(serde_json::json!({
                "error": message,
                "timestamp": Utc::now(),
            })),
        )
            .into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errs: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(errs.to_string())
    }
}
