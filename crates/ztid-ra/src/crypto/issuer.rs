//! Leaf certificate issuance.
//!
//! Leaves are signed by the intermediate CA, which is re-read from the
//! artifact store on every call.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, KeyUsagePurpose,
    SanType, SerialNumber,
};
use time::OffsetDateTime;
use tracing::debug;

use ztid_core::{normalize_spiffe_uri, Serial};

use super::artifacts::{CaArtifacts, INTERMEDIATE};
use super::crl::{to_utc, truncate_to_second};
use super::hierarchy::generate_key;
use super::CaError;

/// Lifetime used when the caller asks for a zero validity.
pub const DEFAULT_LEAF_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// A freshly signed end-entity certificate and its private key.
#[derive(Clone)]
pub struct LeafCertificate {
    pub serial: Serial,
    pub spiffe_id: String,
    pub cert_pem: String,
    pub key_pem: String,
    /// Leaf followed by the intermediate.
    pub chain_pem: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for LeafCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafCertificate")
            .field("serial", &self.serial)
            .field("spiffe_id", &self.spiffe_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Signs leaf certificates for SPIFFE identities.
pub trait LeafIssuer: Send + Sync {
    fn issue_leaf(&self, spiffe_id: &str, validity: Duration) -> Result<LeafCertificate, CaError>;
}

/// Certificate authority backed by the on-disk intermediate.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    artifacts: CaArtifacts,
}

impl CertificateAuthority {
    pub fn new(artifacts: CaArtifacts) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &CaArtifacts {
        &self.artifacts
    }
}

impl LeafIssuer for CertificateAuthority {
    fn issue_leaf(&self, spiffe_id: &str, validity: Duration) -> Result<LeafCertificate, CaError> {
        let signer = self.artifacts.load_signer(INTERMEDIATE)?;

        let uri = normalize_spiffe_uri(spiffe_id);
        let validity = if validity.is_zero() {
            DEFAULT_LEAF_VALIDITY
        } else {
            validity
        };
        let lifetime = time::Duration::try_from(validity)
            .map_err(|e| CaError::InvalidParams(format!("validity: {e}")))?;

        let key = generate_key()?;
        let serial = Serial::generate();
        let not_before = truncate_to_second(OffsetDateTime::now_utc());
        let not_after = not_before + lifetime;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, uri.as_str());
        params.distinguished_name = dn;
        params.serial_number = Some(SerialNumber::from(serial.to_be_bytes()));
        params.not_before = not_before;
        params.not_after = not_after;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ServerAuth,
            ExtendedKeyUsagePurpose::ClientAuth,
        ];
        let san = rcgen::Ia5String::try_from(uri.as_str())
            .map_err(|e| CaError::InvalidParams(format!("SAN URI '{uri}': {e}")))?;
        params.subject_alt_names = vec![SanType::URI(san)];
        params.use_authority_key_identifier_extension = true;

        let cert = params
            .signed_by(&key, &signer.cert, &signer.key)
            .map_err(|e| CaError::SignError(e.to_string()))?;

        let cert_pem = cert.pem();
        let chain_pem = format!("{cert_pem}{}", signer.cert_pem);

        debug!(serial = %serial, spiffe_id = %uri, "Leaf certificate signed");

        Ok(LeafCertificate {
            serial,
            spiffe_id: uri,
            cert_pem,
            key_pem: key.serialize_pem(),
            chain_pem,
            issued_at: to_utc(not_before),
            expires_at: to_utc(not_after),
        })
    }
}
