//! Agent errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] ztid_core::CoreError),

    #[error("certificate request failed: {0}")]
    Client(#[from] ztid_admin_client::ClientError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
