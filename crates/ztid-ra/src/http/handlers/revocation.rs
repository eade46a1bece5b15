//! Revocation and status handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use ztid_core::api::{RevokeResponse, StatusResponse};
use ztid_core::RevocationReason;

use crate::error::RaError;
use crate::http::responses::RevokeParams;
use crate::service::RevokeTarget;
use crate::state::AppState;

/// `POST /v1/revoke?serial=<s>` or `?service=<id>`, optional `&reason=`.
pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RevokeParams>,
) -> Result<Json<RevokeResponse>, RaError> {
    let target = RevokeTarget::from_params(params.serial.as_deref(), params.service.as_deref())?;
    let reason = match params.reason.as_deref() {
        None | Some("") => RevocationReason::default(),
        Some(name) => name.parse()?,
    };

    Ok(Json(state.ra.revoke(target, reason).await?))
}

/// `GET /v1/status`
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(state.ra.status().await)
}
