//! ztid Registration Authority Server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ztid_ra::crypto::CaArtifacts;
use ztid_ra::{http, AppState, Config, RegistrationAuthority};

const HOUR_SECS: u64 = 60 * 60;

/// Upper bound for every hour-valued flag (ten years).
const MAX_HOURS: u64 = 10 * 365 * 24;

/// ztid registration authority: bootstrap tokens in, identity certificates out.
#[derive(Parser, Debug)]
#[command(name = "ztid-ra", about = "ztid registration authority")]
struct Args {
    /// HTTP listen address
    #[arg(long, env = "RA_LISTEN", default_value = "0.0.0.0:8443")]
    listen: SocketAddr,

    /// Override only the port of the listen address
    #[arg(long, env = "RA_PORT")]
    port: Option<u16>,

    /// CA artifact directory (created by `ztca init`)
    #[arg(long, env = "CA_DIR", default_value = "ca")]
    ca_dir: PathBuf,

    /// Leaf certificate validity in hours
    #[arg(
        long,
        env = "LEAF_VALIDITY_HOURS",
        value_parser = hours_parser(),
        default_value_t = 24
    )]
    leaf_validity_hours: u64,

    /// Bootstrap token lifetime in hours
    #[arg(
        long,
        env = "TOKEN_TTL_HOURS",
        value_parser = hours_parser(),
        default_value_t = 24
    )]
    token_ttl_hours: u64,

    /// CRL validity (nextUpdate - thisUpdate) in hours
    #[arg(
        long,
        env = "CRL_VALIDITY_HOURS",
        value_parser = hours_parser(),
        default_value_t = 24
    )]
    crl_validity_hours: u64,

    /// CRL re-signing interval in hours, 0 disables
    #[arg(
        long,
        env = "CRL_REFRESH_HOURS",
        value_parser = hours_parser(),
        default_value_t = 12
    )]
    crl_refresh_hours: u64,
}

fn hours_parser() -> clap::builder::RangedU64ValueParser<u64> {
    clap::value_parser!(u64).range(0..=MAX_HOURS)
}

impl Args {
    fn into_config(self) -> Config {
        let mut listen_addr = self.listen;
        if let Some(port) = self.port {
            listen_addr.set_port(port);
        }

        Config {
            listen_addr,
            ca_dir: self.ca_dir,
            leaf_validity: Duration::from_secs(self.leaf_validity_hours * HOUR_SECS),
            token_ttl: Duration::from_secs(self.token_ttl_hours * HOUR_SECS),
            crl_validity: Duration::from_secs(self.crl_validity_hours * HOUR_SECS),
            crl_refresh_interval: Duration::from_secs(self.crl_refresh_hours * HOUR_SECS),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = Args::parse().into_config();

    let artifacts = CaArtifacts::new(&config.ca_dir);
    if !artifacts.is_initialized() {
        return Err(format!(
            "CA directory '{}' is not initialized. Run `ztca init` first.",
            config.ca_dir.display()
        )
        .into());
    }

    let ra = RegistrationAuthority::from_config(&config);
    let crl = ra.ensure_crl().await?;
    info!(
        ca_dir = %config.ca_dir.display(),
        crl_number = crl.number,
        "Certificate Authority loaded"
    );

    let state = AppState::new(ra);

    if config.crl_refresh_interval.is_zero() {
        warn!("CRL refresh disabled");
    } else {
        tokio::spawn(refresh_crl_loop(state.clone(), config.crl_refresh_interval));
    }

    let router = http::create_router(state);
    let listener = TcpListener::bind(config.listen_addr).await?;

    info!(addr = %config.listen_addr, "Starting ztid registration authority");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Registration authority stopped");
    Ok(())
}

/// Periodically re-sign the CRL so `nextUpdate` never lapses.
async fn refresh_crl_loop(state: Arc<AppState>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; the CRL was just checked.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(e) = state.ra.refresh_crl().await {
            error!(error = %e, "CRL refresh failed");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_hours_converted() {
        let config =
            Args::try_parse_from(["ztid-ra", "--leaf-validity-hours", "2", "--port", "9000"])
                .unwrap()
                .into_config();
        assert_eq!(config.leaf_validity, Duration::from_secs(2 * HOUR_SECS));
        assert_eq!(config.listen_addr.port(), 9000);
    }

    #[test]
    fn test_oversized_hours_rejected() {
        for flag in [
            "--leaf-validity-hours",
            "--token-ttl-hours",
            "--crl-validity-hours",
            "--crl-refresh-hours",
        ] {
            let huge = u64::MAX.to_string();
            assert!(
                Args::try_parse_from(["ztid-ra", flag, huge.as_str()]).is_err(),
                "{flag} accepted {huge}"
            );
        }
        let max = MAX_HOURS.to_string();
        assert!(Args::try_parse_from(["ztid-ra", "--token-ttl-hours", max.as_str()]).is_ok());
    }
}
