//! Error responses for unicat-ex
//!
//! Every failure is rendered as `{ "success": false, "message", "code" }`
//! so the front end can show the message as a toast.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use unicat_common::Error as CoreError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Caller identity missing or unknown (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed request body or parameters (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Core(err) => match err {
                CoreError::AlreadyEnrolled { .. } => (
                    StatusCode::CONFLICT,
                    "ALREADY_ENROLLED",
                    "You are already connected to an exchange program".to_string(),
                ),
                CoreError::AlreadyReviewed { .. } => (
                    StatusCode::CONFLICT,
                    "ALREADY_REVIEWED",
                    "You have already submitted a review for this program".to_string(),
                ),
                CoreError::NotEnrolled { .. } => (
                    StatusCode::FORBIDDEN,
                    "NOT_ENROLLED",
                    "You must be registered for this program to leave a review".to_string(),
                ),
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::ProgramNotFound(_) | CoreError::UserNotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
                }
                CoreError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone()),
                CoreError::Database(_)
                | CoreError::Io(_)
                | CoreError::Config(_)
                | CoreError::Internal(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "message": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        let user = Uuid::nil();
        let cases = [
            (ApiError::from(CoreError::AlreadyEnrolled { user }), StatusCode::CONFLICT),
            (
                ApiError::from(CoreError::AlreadyReviewed { user, program_id: 1 }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(CoreError::NotEnrolled { user, program_id: 1 }),
                StatusCode::FORBIDDEN,
            ),
            (ApiError::from(CoreError::ProgramNotFound(1)), StatusCode::NOT_FOUND),
            (
                ApiError::from(CoreError::InvalidInput("x".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(CoreError::Internal("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::Unauthorized("who".to_string()), StatusCode::UNAUTHORIZED),
        ];

        for (err, expected) in cases {
            assert_eq!(err.parts().0, expected, "{:?}", err);
        }
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = ApiError::from(CoreError::Config("secret path /etc/x".to_string()));
        let (_, code, message) = err.parts();
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!message.contains("/etc/x"));
    }
}
