//! Admin client library for ztid.
//!
//! Provides an HTTP client for the ztid registration authority, shared by
//! the `ztca` CLI and the bootstrap agent.

pub mod error;
pub mod http;

pub use error::ClientError;
pub use http::RaClient;
