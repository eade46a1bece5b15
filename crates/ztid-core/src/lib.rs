//! ztid Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Filesystem or key material
//! - Runtime specifics
//!
//! All types here represent the identity domain of ztid: services,
//! bootstrap tokens, issued certificates and revocations.

pub mod api;
pub mod error;
pub mod ids;
pub mod model;
pub mod spiffe;
pub mod status;

// Re-export commonly used types
pub use error::CoreError;
pub use ids::{Serial, ServiceId};
pub use model::{IssuedCert, PolicyRule, RevocationEntry, RevocationReason, ServiceIdentity};
pub use spiffe::{normalize_spiffe_uri, spiffe_id_for_service};
pub use status::{CertStatus, TokenStatus};
