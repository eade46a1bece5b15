//! ztid bootstrap agent
//!
//! Runs beside a workload: redeems its bootstrap token with the registration
//! authority once, writes the certificate bundle, then stays up so the
//! container lifecycle matches the workload.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod enroll;
mod error;
mod store;

use config::Args;
use error::AgentError;
use store::CertStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "Bootstrap failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AgentError> {
    let config = Args::parse().into_config()?;

    info!(
        service_id = %config.service_id,
        cert_dir = %config.cert_dir.display(),
        "Starting ztid agent"
    );

    let issued = enroll::request_certificate(&config).await?;

    let store = CertStore::new(&config.cert_dir);
    store.write(&issued)?;

    info!(
        service_id = %config.service_id,
        serial = %issued.serial,
        expires_at = %issued.expires_at,
        "Certificate issued"
    );

    // No renewal; idle until the workload goes away
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
    Ok(())
}
