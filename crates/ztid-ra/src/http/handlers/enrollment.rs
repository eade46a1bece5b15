//! Registration and issuance handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use ztid_core::api::{IssueResponse, RegisterResponse, BOOTSTRAP_TOKEN_HEADER};

use crate::error::RaError;
use crate::http::responses::{IssueParams, RegisterParams};
use crate::state::AppState;

/// `POST /v1/register?service=<id>`
pub async fn register(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RegisterParams>,
) -> Result<Json<RegisterResponse>, RaError> {
    let service = params
        .service
        .ok_or_else(|| RaError::Validation("missing 'service' parameter".to_string()))?;

    Ok(Json(state.ra.register(&service).await?))
}

/// `POST /v1/issue` with `X-Bootstrap-Token`, or `?token=` as a fallback.
pub async fn issue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<IssueParams>,
) -> Result<Json<IssueResponse>, RaError> {
    let token = headers
        .get(BOOTSTRAP_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or(params.token)
        .unwrap_or_default();

    Ok(Json(state.ra.issue(&token).await?))
}
