//! Liveness and Prometheus endpoints, shared by the RA and the CRL publisher.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;

use ztid_core::api::HealthResponse;

use crate::metrics::collect_metrics;
use crate::state::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// `GET /health`. Liveness only; CA material is checked per request.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// `GET /metrics`
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        collect_metrics(&state).await,
    )
}
