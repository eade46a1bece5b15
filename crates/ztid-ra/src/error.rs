//! Registration authority errors.

use thiserror::Error;

use ztid_core::CoreError;

use crate::crypto::CaError;

/// Errors returned by registration authority operations.
#[derive(Debug, Error)]
pub enum RaError {
    /// Missing or malformed request parameter. Retry with corrected input.
    #[error("{0}")]
    Validation(String),

    /// Missing, unknown, expired or already-used bootstrap token.
    #[error("{0}")]
    Auth(String),

    /// Key material, signing or storage failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RaError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<CoreError> for RaError {
    fn from(err: CoreError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<CaError> for RaError {
    fn from(err: CaError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RaError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {err}"))
    }
}
