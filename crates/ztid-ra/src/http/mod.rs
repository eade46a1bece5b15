//! HTTP surface of the registration authority.
//!
//! RA router:
//! - Registration (`POST /v1/register`)
//! - Issuance (`POST /v1/issue`)
//! - Revocation (`POST /v1/revoke`)
//! - Status (`GET /v1/status`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)
//!
//! CRL router: `GET /crl` and `/health`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;
pub mod responses;

pub use handlers::{CrlPublisher, PKIX_CRL_CONTENT_TYPE};

/// Create the registration authority router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // API routes
        .route("/v1/register", post(handlers::register))
        .route("/v1/issue", post(handlers::issue))
        .route("/v1/revoke", post(handlers::revoke))
        .route("/v1/status", get(handlers::status))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Create the CRL publisher router serving the file at `crl_path`.
pub fn create_crl_router(crl_path: impl Into<PathBuf>) -> Router {
    Router::new()
        .route("/crl", get(handlers::get_crl))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(CrlPublisher::new(crl_path))
}
