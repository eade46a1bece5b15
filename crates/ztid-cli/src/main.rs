//! ztca - Command line interface for the ztid certificate authority.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ztid_admin_client::RaClient;
use ztid_core::{spiffe_id_for_service, RevocationReason, Serial, ServiceId};
use ztid_ra::crypto::{
    init_ca, CaArtifacts, CertificateAuthority, HierarchyConfig, LeafCertificate, LeafIssuer,
};

/// ztca - ztid certificate authority administration
#[derive(Parser, Debug)]
#[command(name = "ztca")]
#[command(about = "Administration CLI for the ztid certificate authority", long_about = None)]
struct Cli {
    /// CA artifact directory
    #[arg(long, env = "CA_DIR", default_value = "ca", global = true)]
    ca_dir: PathBuf,

    /// Registration authority URL
    #[arg(long, env = "RA_URL", default_value = "http://localhost:8443", global = true)]
    ra_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the root and intermediate CAs, trust bundle and empty CRL
    Init,

    /// Register a service with the RA and print its bootstrap token
    Register {
        /// Service id
        service: String,
    },

    /// Issue a certificate locally from the CA directory (no RA involved)
    Issue {
        /// Service id
        service: String,

        /// Certificate validity in hours (0 = default 24h)
        #[arg(long, default_value_t = 0)]
        validity_hours: u64,

        /// Output directory (default: <ca-dir>/issued/<service>)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Revoke a certificate by serial, or every certificate of a service
    Revoke {
        /// Serial number (hex)
        serial: Option<String>,

        /// Revoke all certificates issued to this service
        #[arg(long)]
        service: Option<String>,

        /// RFC 5280 reason (e.g. key_compromise, superseded)
        #[arg(long, default_value = "unspecified")]
        reason: RevocationReason,
    },

    /// Show active and revoked certificates
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init(&cli.ca_dir)?;
        }
        Commands::Register { service } => {
            register(&cli.ra_url, &service).await?;
        }
        Commands::Issue {
            service,
            validity_hours,
            out_dir,
        } => {
            let service = ServiceId::parse(service)?;
            let out_dir =
                out_dir.unwrap_or_else(|| cli.ca_dir.join("issued").join(service.as_str()));
            let validity = Duration::from_secs(validity_hours * 60 * 60);
            let leaf = issue_local(&cli.ca_dir, &service, validity, &out_dir)?;
            println!("Certificate issued:");
            print_leaf(&leaf);
            println!("  Written to: {}", out_dir.display());
        }
        Commands::Revoke {
            serial,
            service,
            reason,
        } => {
            revoke(&cli.ra_url, serial, service, reason).await?;
        }
        Commands::Status => {
            status(&cli.ra_url).await?;
        }
    }

    Ok(())
}

fn init(ca_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let artifacts = CaArtifacts::new(ca_dir);
    let created = init_ca(&artifacts, &HierarchyConfig::default())?;

    println!("CA initialized in {}:", ca_dir.display());
    println!("  Root serial:         {}", created.root_serial);
    println!("  Intermediate serial: {}", created.intermediate_serial);
    println!("  Trust bundle:        {}", artifacts.trust_bundle_path().display());
    println!("  CRL:                 {}", artifacts.crl_path().display());

    Ok(())
}

async fn register(ra_url: &str, service: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = RaClient::new(ra_url);
    let service = ServiceId::parse(service)?;

    let response = client.register(&service).await?;

    println!("Service registered:");
    println!("  Service:    {}", service);
    println!("  SPIFFE ID:  {}", response.spiffe_id);
    println!("  Token:      {}", response.bootstrap_token);
    println!("  Expires:    {}", format_timestamp(response.expires_at));

    Ok(())
}

/// Sign a leaf with the local intermediate and write cert, key and chain.
fn issue_local(
    ca_dir: &Path,
    service: &ServiceId,
    validity: Duration,
    out_dir: &Path,
) -> Result<LeafCertificate, Box<dyn std::error::Error>> {
    let ca = CertificateAuthority::new(CaArtifacts::new(ca_dir));
    let leaf = ca.issue_leaf(&spiffe_id_for_service(service), validity)?;

    debug!(out_dir = %out_dir.display(), serial = %leaf.serial, "Writing certificate bundle");
    std::fs::create_dir_all(out_dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(out_dir, std::fs::Permissions::from_mode(0o700))?;
    }
    write_file(&out_dir.join("cert.pem"), &leaf.cert_pem, 0o644)?;
    write_file(&out_dir.join("key.pem"), &leaf.key_pem, 0o600)?;
    write_file(&out_dir.join("chain.pem"), &leaf.chain_pem, 0o644)?;

    Ok(leaf)
}

async fn revoke(
    ra_url: &str,
    serial: Option<String>,
    service: Option<String>,
    reason: RevocationReason,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = RaClient::new(ra_url);

    let response = match (service, serial) {
        (Some(service), _) => {
            client
                .revoke_service(&ServiceId::parse(service)?, reason)
                .await?
        }
        (None, Some(serial)) => client.revoke_serial(serial.parse::<Serial>()?, reason).await?,
        (None, None) => return Err("either a serial or --service is required".into()),
    };

    println!("Revoked ({}):", response.revoked.len());
    for serial in response.revoked {
        println!("  {}", serial);
    }

    Ok(())
}

async fn status(ra_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = RaClient::new(ra_url);
    let status = client.status().await?;

    println!("Active certificates ({}):", status.certs.len());
    println!("{:<34}  {:<24}  {}", "SERIAL", "SERVICE", "EXPIRES");
    println!("{}", "-".repeat(80));
    for cert in &status.certs {
        println!(
            "{:<34}  {:<24}  {}",
            cert.serial,
            cert.service_id,
            format_timestamp(cert.expires_at)
        );
    }

    println!();
    println!("Revoked certificates ({}):", status.revoked.len());
    println!("{:<34}  {:<24}  {:<22}  {}", "SERIAL", "SERVICE", "REASON", "REVOKED");
    println!("{}", "-".repeat(100));
    for entry in &status.revoked {
        let service = entry
            .service_id
            .as_ref()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<34}  {:<24}  {:<22}  {}",
            entry.serial,
            service,
            entry.reason,
            format_timestamp(entry.revoked_at)
        );
    }

    Ok(())
}

fn print_leaf(leaf: &LeafCertificate) {
    println!("  Serial:     {}", leaf.serial);
    println!("  SPIFFE ID:  {}", leaf.spiffe_id);
    println!("  Expires:    {}", format_timestamp(leaf.expires_at));
}

/// Write via a temp file and rename.
fn write_file(path: &Path, contents: &str, mode: u32) -> std::io::Result<()> {
    let tmp = path.with_extension("pem.tmp");
    // A leftover temp file would keep its old mode
    match std::fs::remove_file(&tmp) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(&tmp)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    std::fs::rename(&tmp, path)
}

fn format_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
