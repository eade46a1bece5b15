//! Core domain errors.

use thiserror::Error;

/// Core domain errors for ztid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Service identifier is empty or contains disallowed characters.
    #[error("Invalid service id '{id}': {reason}")]
    InvalidServiceId { id: String, reason: &'static str },

    /// Serial number is not a positive 128-bit hex value.
    #[error("Invalid serial '{0}'")]
    InvalidSerial(String),

    /// Unknown revocation reason name.
    #[error("Unknown revocation reason '{0}'")]
    UnknownRevocationReason(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
