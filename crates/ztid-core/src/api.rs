//! Wire types for the registration authority HTTP API.
//!
//! Shared by the server and the admin client so both sides agree on shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{Serial, ServiceId};
use crate::model::RevocationReason;

/// Header carrying the bootstrap token on `POST /v1/issue`.
pub const BOOTSTRAP_TOKEN_HEADER: &str = "x-bootstrap-token";

// ============================================================================
// Registration
// ============================================================================

/// Response body for `POST /v1/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Single-use token; only ever returned here.
    pub bootstrap_token: String,

    pub spiffe_id: String,

    /// After this instant the token is rejected even if unused.
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Issuance
// ============================================================================

/// Response body for `POST /v1/issue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResponse {
    pub cert_pem: String,
    pub key_pem: String,
    pub chain_pem: String,
    pub serial: Serial,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Revocation
// ============================================================================

/// Response body for `POST /v1/revoke`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeResponse {
    /// Every serial the request targeted, including ones already revoked.
    pub revoked: Vec<Serial>,
}

// ============================================================================
// Status
// ============================================================================

/// An issued, unrevoked certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCertResponse {
    pub serial: Serial,
    pub service_id: ServiceId,
    pub spiffe_id: String,
    pub expires_at: DateTime<Utc>,
}

/// A revocation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedCertResponse {
    pub serial: Serial,
    /// Absent when the serial was never issued by this instance.
    pub service_id: Option<ServiceId>,
    pub revoked_at: DateTime<Utc>,
    pub reason: RevocationReason,
}

/// Response body for `GET /v1/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    pub certs: Vec<ActiveCertResponse>,
    pub revoked: Vec<RevokedCertResponse>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
