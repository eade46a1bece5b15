//! ztid CRL Publisher
//!
//! Serves the CA's current revocation list as DER on `GET /crl`.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ztid_ra::{http, CrlPublisherConfig};

/// Serve the current CRL over HTTP.
#[derive(Parser, Debug)]
#[command(name = "ztid-crl-publisher", about = "ztid CRL publisher")]
struct Args {
    /// Listen port
    #[arg(long, env = "CRL_PORT", default_value_t = 8444)]
    port: u16,

    /// CRL artifact to serve
    #[arg(long, env = "CRL_PATH", default_value = "ca/crl.pem")]
    crl_path: PathBuf,
}

impl Args {
    fn into_config(self) -> CrlPublisherConfig {
        let mut config = CrlPublisherConfig {
            crl_path: self.crl_path,
            ..CrlPublisherConfig::default()
        };
        config.listen_addr.set_port(self.port);
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = Args::parse().into_config();

    let router = http::create_crl_router(config.crl_path.clone());
    let listener = TcpListener::bind(config.listen_addr).await?;

    info!(
        addr = %config.listen_addr,
        crl_path = %config.crl_path.display(),
        "Starting CRL publisher"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    Ok(())
}
