//! CRL publishing handler.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Media type of a DER CRL.
pub const PKIX_CRL_CONTENT_TYPE: &str = "application/pkix-crl";

/// Serves the CRL artifact from disk.
#[derive(Debug, Clone)]
pub struct CrlPublisher {
    crl_path: PathBuf,
}

impl CrlPublisher {
    pub fn new(crl_path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            crl_path: crl_path.into(),
        })
    }

    /// Read the CRL as DER. PEM files are decoded; anything else is served as is.
    async fn load_der(&self) -> std::io::Result<Vec<u8>> {
        let bytes = tokio::fs::read(&self.crl_path).await?;
        if bytes.starts_with(b"-----BEGIN") {
            return ::pem::parse(&bytes)
                .map(|p| p.into_contents())
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e));
        }
        Ok(bytes)
    }
}

/// `GET /crl`
pub async fn get_crl(State(publisher): State<Arc<CrlPublisher>>) -> Response {
    match publisher.load_der().await {
        Ok(der) => ([(header::CONTENT_TYPE, PKIX_CRL_CONTENT_TYPE)], der).into_response(),
        Err(e) => {
            warn!(path = %publisher.crl_path.display(), error = %e, "CRL unavailable");
            (StatusCode::NOT_FOUND, "CRL not found").into_response()
        }
    }
}
