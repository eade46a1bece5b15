//! Agent configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use ztid_core::ServiceId;

use crate::error::AgentError;

/// Request timeout for the issue call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// ztid bootstrap agent
#[derive(Parser, Debug)]
#[command(name = "ztid-agent")]
#[command(about = "Redeem a bootstrap token and write the workload certificate", long_about = None)]
pub struct Args {
    /// Service id this workload runs as
    #[arg(long, env = "SERVICE_ID")]
    pub service_id: String,

    /// One-time bootstrap token from `ztca register`
    #[arg(long, env = "BOOTSTRAP_TOKEN", hide_env_values = true)]
    pub bootstrap_token: String,

    /// Registration authority URL
    #[arg(long, env = "RA_URL", default_value = "http://ra:8443")]
    pub ra_url: String,

    /// Directory for cert.pem, key.pem and chain.pem
    #[arg(long, env = "CERT_DIR", default_value = "/certs")]
    pub cert_dir: PathBuf,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    pub timeout_secs: u64,
}

impl Args {
    pub fn into_config(self) -> Result<Config, AgentError> {
        if self.bootstrap_token.trim().is_empty() {
            return Err(AgentError::Config("BOOTSTRAP_TOKEN is empty".to_string()));
        }
        Ok(Config {
            service_id: ServiceId::parse(self.service_id)?,
            bootstrap_token: self.bootstrap_token.trim().to_string(),
            ra_url: self.ra_url,
            cert_dir: self.cert_dir,
            request_timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

/// Agent configuration.
#[derive(Clone)]
pub struct Config {
    pub service_id: ServiceId,
    pub bootstrap_token: String,
    pub ra_url: String,
    pub cert_dir: PathBuf,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("service_id", &self.service_id)
            .field("bootstrap_token", &"<redacted>")
            .field("ra_url", &self.ra_url)
            .field("cert_dir", &self.cert_dir)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
