//! ztid Registration Authority Library
//!
//! This crate provides the certificate authority (root and intermediate
//! hierarchy, leaf issuance, revocation lists), the in-memory registry and
//! the HTTP surface of the ztid registration authority.

pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod metrics;
pub mod service;
pub mod state;

pub use config::{Config, CrlPublisherConfig};
pub use error::RaError;
pub use service::{RaSettings, RegistrationAuthority, RevokeTarget};
pub use state::{AppState, Registry};
