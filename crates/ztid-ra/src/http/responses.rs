//! HTTP request parameters and error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::error;

use ztid_core::api::ErrorResponse;

use crate::error::RaError;

// ============================================================================
// Query parameters
// ============================================================================

/// Query for `POST /v1/register`.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterParams {
    pub service: Option<String>,
}

/// Query for `POST /v1/issue`. The header takes precedence over `token`.
#[derive(Debug, Default, Deserialize)]
pub struct IssueParams {
    pub token: Option<String>,
}

/// Query for `POST /v1/revoke`.
#[derive(Debug, Default, Deserialize)]
pub struct RevokeParams {
    pub serial: Option<String>,
    pub service: Option<String>,
    /// RFC 5280 reason name in snake_case, `unspecified` when absent.
    pub reason: Option<String>,
}

// ============================================================================
// Error types
// ============================================================================

/// Message sent in place of internal error details.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error";

impl IntoResponse for RaError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            RaError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            RaError::Auth(message) => (StatusCode::UNAUTHORIZED, message),
            RaError::Internal(detail) => {
                error!(error = %detail, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
