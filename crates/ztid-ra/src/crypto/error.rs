//! Errors raised by certificate authority operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during CA operations.
#[derive(Debug, Error)]
pub enum CaError {
    #[error("CA directory '{0}' is already initialized")]
    AlreadyInitialized(PathBuf),

    #[error("failed to read CA artifact '{path}': {source}")]
    ReadArtifact {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write CA artifact '{path}': {source}")]
    WriteArtifact {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse CA certificate: {0}")]
    ParseCert(String),

    #[error("failed to parse CA private key: {0}")]
    ParseKey(String),

    #[error("failed to parse CRL: {0}")]
    ParseCrl(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid certificate parameters: {0}")]
    InvalidParams(String),

    #[error("failed to sign: {0}")]
    SignError(String),
}
