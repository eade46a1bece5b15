//! Root + intermediate CA hierarchy builder.
//!
//! All artifacts are generated into a staging directory next to the target
//! and published with a single rename, so a failure part way through never
//! leaves a half-populated CA directory behind.

use std::path::Path;
use std::time::Duration;

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose, SerialNumber,
};
use time::OffsetDateTime;
use tracing::info;

use ztid_core::Serial;

use super::artifacts::{CaArtifacts, SigningMaterial, INTERMEDIATE, ROOT};
use super::crl::{render_crl, truncate_to_second, DEFAULT_CRL_VALIDITY};
use super::CaError;

/// Organization placed in every subject this CA issues.
pub const ORGANIZATION: &str = "Zero-Trust Identity";

pub const ROOT_COMMON_NAME: &str = "Root CA";

pub const INTERMEDIATE_COMMON_NAME: &str = "Intermediate CA";

/// Validity periods for the hierarchy.
#[derive(Debug, Clone)]
pub struct HierarchyConfig {
    pub root_validity: Duration,
    pub intermediate_validity: Duration,
    pub crl_validity: Duration,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            // 10 years
            root_validity: Duration::from_secs(10 * 365 * 24 * 60 * 60),
            // 1 year
            intermediate_validity: Duration::from_secs(365 * 24 * 60 * 60),
            crl_validity: DEFAULT_CRL_VALIDITY,
        }
    }
}

/// Serials of a freshly created hierarchy.
#[derive(Debug, Clone)]
pub struct InitializedCa {
    pub root_serial: Serial,
    pub intermediate_serial: Serial,
}

/// Create root and intermediate CAs, the trust bundle and an empty CRL.
///
/// Refuses to touch a base directory that already has contents.
pub fn init_ca(artifacts: &CaArtifacts, config: &HierarchyConfig) -> Result<InitializedCa, CaError> {
    let base_dir = artifacts.base_dir();
    if dir_has_entries(base_dir)? {
        return Err(CaError::AlreadyInitialized(base_dir.to_path_buf()));
    }

    let parent = match base_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|source| CaError::WriteArtifact {
        path: parent.clone(),
        source,
    })?;

    let staging = tempfile::Builder::new()
        .prefix(".ztca-staging-")
        .tempdir_in(&parent)
        .map_err(|source| CaError::WriteArtifact {
            path: parent.clone(),
            source,
        })?;
    let staged = CaArtifacts::new(staging.path());

    // Root
    let root_serial = Serial::generate();
    let root_key = generate_key()?;
    let root_cert = build_root(&root_key, root_serial, config.root_validity)?;
    let root_pem = root_cert.pem();
    staged.write_key_cert(ROOT, &root_key.serialize_pem(), &root_pem)?;

    // Intermediate
    let intermediate_serial = Serial::generate();
    let intermediate_key = generate_key()?;
    let intermediate_cert = build_intermediate(
        &intermediate_key,
        intermediate_serial,
        config.intermediate_validity,
        &root_cert,
        &root_key,
    )?;
    let intermediate_pem = intermediate_cert.pem();
    staged.write_key_cert(
        INTERMEDIATE,
        &intermediate_key.serialize_pem(),
        &intermediate_pem,
    )?;

    staged.write_trust_bundle(&root_pem, &intermediate_pem)?;

    // Initial CRL, signed from the staged files like every later update
    let signer: SigningMaterial = staged.load_signer(INTERMEDIATE)?;
    let (crl_pem, _) = render_crl(&signer, 1, Vec::new(), config.crl_validity)?;
    staged.write_crl(&crl_pem)?;

    restrict_dir(staging.path())?;

    // An empty target directory is replaced; rename cannot overwrite it portably.
    if base_dir.exists() {
        std::fs::remove_dir(base_dir).map_err(|source| CaError::WriteArtifact {
            path: base_dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::rename(staging.path(), base_dir).map_err(|source| CaError::WriteArtifact {
        path: base_dir.to_path_buf(),
        source,
    })?;

    info!(
        ca_dir = %base_dir.display(),
        root_serial = %root_serial,
        intermediate_serial = %intermediate_serial,
        "CA hierarchy initialized"
    );

    Ok(InitializedCa {
        root_serial,
        intermediate_serial,
    })
}

pub(crate) fn generate_key() -> Result<KeyPair, CaError> {
    KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
        .map_err(|e| CaError::KeyGeneration(e.to_string()))
}

pub(crate) fn subject(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, ORGANIZATION);
    dn.push(DnType::CommonName, common_name);
    dn
}

fn validity_window(
    params: &mut CertificateParams,
    validity: Duration,
) -> Result<(), CaError> {
    let validity = time::Duration::try_from(validity)
        .map_err(|e| CaError::InvalidParams(format!("validity: {e}")))?;
    let now = truncate_to_second(OffsetDateTime::now_utc());
    params.not_before = now;
    params.not_after = now + validity;
    Ok(())
}

fn build_root(key: &KeyPair, serial: Serial, validity: Duration) -> Result<Certificate, CaError> {
    let mut params = CertificateParams::default();
    params.distinguished_name = subject(ROOT_COMMON_NAME);
    params.serial_number = Some(SerialNumber::from(serial.to_be_bytes()));
    validity_window(&mut params, validity)?;
    // May sign the intermediate only
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(1));
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

    params
        .self_signed(key)
        .map_err(|e| CaError::SignError(e.to_string()))
}

fn build_intermediate(
    key: &KeyPair,
    serial: Serial,
    validity: Duration,
    root_cert: &Certificate,
    root_key: &KeyPair,
) -> Result<Certificate, CaError> {
    let mut params = CertificateParams::default();
    params.distinguished_name = subject(INTERMEDIATE_COMMON_NAME);
    params.serial_number = Some(SerialNumber::from(serial.to_be_bytes()));
    validity_window(&mut params, validity)?;
    // Signs end-entity certificates only
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.use_authority_key_identifier_extension = true;

    params
        .signed_by(key, root_cert, root_key)
        .map_err(|e| CaError::SignError(e.to_string()))
}

fn dir_has_entries(dir: &Path) -> Result<bool, CaError> {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CaError::ReadArtifact {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

fn restrict_dir(dir: &Path) -> Result<(), CaError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).map_err(
            |source| CaError::WriteArtifact {
                path: dir.to_path_buf(),
                source,
            },
        )?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::artifacts::TRUST_BUNDLE_FILE;
    use x509_parser::prelude::*;

    fn parse_pem_certs(pem: &str) -> Vec<Vec<u8>> {
        ::pem::parse_many(pem)
            .unwrap()
            .into_iter()
            .map(|p| p.into_contents())
            .collect()
    }

    #[test]
    fn test_init_writes_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = CaArtifacts::new(dir.path().join("ca"));
        init_ca(&artifacts, &HierarchyConfig::default()).unwrap();

        for file in [
            "root.key",
            "root.crt",
            "intermediate.key",
            "intermediate.crt",
            TRUST_BUNDLE_FILE,
            "crl.pem",
        ] {
            assert!(
                artifacts.base_dir().join(file).is_file(),
                "missing {file}"
            );
        }
        assert!(artifacts.is_initialized());

        // No staging directory left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".ztca-staging-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_init_refuses_populated_dir() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = CaArtifacts::new(dir.path().join("ca"));
        init_ca(&artifacts, &HierarchyConfig::default()).unwrap();

        let root_before = std::fs::read(artifacts.cert_path(ROOT)).unwrap();
        assert!(matches!(
            init_ca(&artifacts, &HierarchyConfig::default()),
            Err(CaError::AlreadyInitialized(_))
        ));
        assert_eq!(std::fs::read(artifacts.cert_path(ROOT)).unwrap(), root_before);
    }

    #[test]
    fn test_init_into_existing_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = CaArtifacts::new(dir.path());
        init_ca(&artifacts, &HierarchyConfig::default()).unwrap();
        assert!(artifacts.is_initialized());
    }

    #[test]
    fn test_hierarchy_chains_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = CaArtifacts::new(dir.path().join("ca"));
        let created = init_ca(&artifacts, &HierarchyConfig::default()).unwrap();

        let bundle = std::fs::read_to_string(artifacts.trust_bundle_path()).unwrap();
        let ders = parse_pem_certs(&bundle);
        assert_eq!(ders.len(), 2);

        let (_, root) = X509Certificate::from_der(&ders[0]).unwrap();
        let (_, intermediate) = X509Certificate::from_der(&ders[1]).unwrap();

        // Root is self-signed, intermediate is signed by root
        root.verify_signature(None).unwrap();
        intermediate
            .verify_signature(Some(root.public_key()))
            .unwrap();
        assert_eq!(
            intermediate.issuer().to_string(),
            root.subject().to_string()
        );

        for cert in [&root, &intermediate] {
            let bc = cert.basic_constraints().unwrap().unwrap().value;
            assert!(bc.ca);
            let ku = cert.key_usage().unwrap().unwrap().value;
            assert!(ku.key_cert_sign());
            assert!(ku.crl_sign());
        }
        assert!(intermediate
            .key_usage()
            .unwrap()
            .unwrap()
            .value
            .digital_signature());

        assert!(root.subject().to_string().contains("CN=Root CA"));
        assert!(intermediate
            .subject()
            .to_string()
            .contains("CN=Intermediate CA"));

        assert_eq!(
            Serial::from_be_bytes(root.raw_serial()).unwrap(),
            created.root_serial
        );
        assert_eq!(
            Serial::from_be_bytes(intermediate.raw_serial()).unwrap(),
            created.intermediate_serial
        );
    }
}
