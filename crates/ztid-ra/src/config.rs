//! Registration authority configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::crypto::{DEFAULT_CRL_VALIDITY, DEFAULT_LEAF_VALIDITY};

/// Registration authority configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address.
    pub listen_addr: SocketAddr,

    /// CA artifact directory.
    pub ca_dir: PathBuf,

    /// Lifetime of issued leaf certificates.
    pub leaf_validity: Duration,

    /// Lifetime of an unused bootstrap token.
    pub token_ttl: Duration,

    /// `nextUpdate - thisUpdate` of every CRL this instance signs.
    pub crl_validity: Duration,

    /// How often the CRL is re-signed with fresh update times.
    pub crl_refresh_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8443)),
            ca_dir: PathBuf::from("ca"),
            leaf_validity: DEFAULT_LEAF_VALIDITY,
            token_ttl: Duration::from_secs(24 * 60 * 60),
            crl_validity: DEFAULT_CRL_VALIDITY,
            crl_refresh_interval: Duration::from_secs(12 * 60 * 60),
        }
    }
}

/// CRL publisher configuration.
#[derive(Debug, Clone)]
pub struct CrlPublisherConfig {
    pub listen_addr: SocketAddr,

    /// PEM CRL served on `/crl`.
    pub crl_path: PathBuf,
}

impl Default for CrlPublisherConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8444)),
            crl_path: PathBuf::from("ca").join(crate::crypto::CRL_FILE),
        }
    }
}
