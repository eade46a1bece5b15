//! On-disk CA artifact store.
//!
//! Layout under the base directory:
//! `root.key`, `root.crt`, `intermediate.key`, `intermediate.crt`,
//! `trust-bundle.pem`, `crl.pem`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use rcgen::{Certificate, CertificateParams, KeyPair};

use super::CaError;

/// Artifact name of the self-signed root.
pub const ROOT: &str = "root";

/// Artifact name of the intermediate that signs leaves and CRLs.
pub const INTERMEDIATE: &str = "intermediate";

pub const TRUST_BUNDLE_FILE: &str = "trust-bundle.pem";

pub const CRL_FILE: &str = "crl.pem";

/// Paths and file access for one CA base directory.
#[derive(Debug, Clone)]
pub struct CaArtifacts {
    base_dir: PathBuf,
}

/// A CA key and certificate loaded for signing.
pub struct SigningMaterial {
    /// Certificate exactly as stored, used verbatim in chains.
    pub cert_pem: String,

    /// Signing view of the stored certificate (same subject and key id).
    pub cert: Certificate,

    pub key: KeyPair,
}

impl CaArtifacts {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn key_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.key"))
    }

    pub fn cert_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.crt"))
    }

    pub fn trust_bundle_path(&self) -> PathBuf {
        self.base_dir.join(TRUST_BUNDLE_FILE)
    }

    pub fn crl_path(&self) -> PathBuf {
        self.base_dir.join(CRL_FILE)
    }

    /// True once the intermediate, the minimum needed to issue, is present.
    pub fn is_initialized(&self) -> bool {
        self.key_path(INTERMEDIATE).is_file() && self.cert_path(INTERMEDIATE).is_file()
    }

    /// Read a CA key and certificate from disk.
    ///
    /// Nothing is cached; every call sees the latest material.
    pub fn load_signer(&self, name: &str) -> Result<SigningMaterial, CaError> {
        let cert_pem = read_to_string(&self.cert_path(name))?;
        let key_pem = read_to_string(&self.key_path(name))?;

        let key = KeyPair::from_pem(&key_pem).map_err(|e| CaError::ParseKey(e.to_string()))?;

        // Rebuild signing params from the stored cert so issued artifacts carry
        // its exact subject and key identifier.
        let params = CertificateParams::from_ca_cert_pem(&cert_pem)
            .map_err(|e| CaError::ParseCert(e.to_string()))?;
        let cert = params
            .self_signed(&key)
            .map_err(|e| CaError::ParseCert(e.to_string()))?;

        Ok(SigningMaterial {
            cert_pem,
            cert,
            key,
        })
    }

    /// Write a key (mode 0600) and certificate (mode 0644).
    pub fn write_key_cert(&self, name: &str, key_pem: &str, cert_pem: &str) -> Result<(), CaError> {
        write_file(&self.key_path(name), key_pem.as_bytes(), true)?;
        write_file(&self.cert_path(name), cert_pem.as_bytes(), false)
    }

    pub fn write_trust_bundle(&self, root_pem: &str, intermediate_pem: &str) -> Result<(), CaError> {
        let bundle = format!("{root_pem}{intermediate_pem}");
        write_file(&self.trust_bundle_path(), bundle.as_bytes(), false)
    }

    /// Read the current CRL, `None` if it has not been written yet.
    pub fn read_crl(&self) -> Result<Option<String>, CaError> {
        let path = self.crl_path();
        match std::fs::read_to_string(&path) {
            Ok(pem) => Ok(Some(pem)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CaError::ReadArtifact { path, source }),
        }
    }

    /// Replace the CRL via temp file and rename so readers never see a torn write.
    pub fn write_crl(&self, crl_pem: &str) -> Result<(), CaError> {
        let path = self.crl_path();
        let tmp = self.base_dir.join(format!("{CRL_FILE}.tmp"));
        write_file(&tmp, crl_pem.as_bytes(), false)?;
        std::fs::rename(&tmp, &path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            CaError::WriteArtifact { path, source }
        })
    }
}

fn read_to_string(path: &Path) -> Result<String, CaError> {
    std::fs::read_to_string(path).map_err(|source| CaError::ReadArtifact {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &[u8], private: bool) -> Result<(), CaError> {
    let map_err = |source| CaError::WriteArtifact {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(if private { 0o600 } else { 0o644 });
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options.open(path).map_err(map_err)?;
    file.write_all(contents).map_err(map_err)?;
    file.sync_all().map_err(map_err)
}
