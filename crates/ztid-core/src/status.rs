//! Status enums for bootstrap tokens and issued certificates.

use serde::{Deserialize, Serialize};

/// Lifecycle of a bootstrap token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenStatus {
    /// Minted by registration, not yet presented.
    #[default]
    Unused,
    /// Consumed by an issuance attempt. Terminal.
    Used,
    /// Past its TTL without being used. Terminal.
    Expired,
}

impl TokenStatus {
    /// Returns true if the token can still authorize an issuance.
    pub fn is_redeemable(&self) -> bool {
        matches!(self, Self::Unused)
    }
}

/// Lifecycle of an issued certificate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertStatus {
    /// Issued and not revoked.
    #[default]
    Active,
    /// Revoked. Terminal.
    Revoked,
}

impl CertStatus {
    /// Returns true if the certificate is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }
}
