//! Request-boundary errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Why a request was stopped before reaching its handler.
///
/// Responses only carry a generic message; the precise token failure is
/// logged where the rejection happens.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Missing, invalid or expired credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated but lacking a required role.
    #[error("insufficient permissions")]
    Forbidden,

    /// Per-user request limit hit.
    #[error("rate limit exceeded")]
    TooManyRequests,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
