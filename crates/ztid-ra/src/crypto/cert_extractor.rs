//! Certificate parsing and SPIFFE identity extraction.
//!
//! Reads the identity back out of an issued leaf: the URI entry of the
//! Subject-Alternative-Name extension, which must start with `spiffe://`.

use thiserror::Error;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::*;

use ztid_core::Serial;

/// Errors that can occur during certificate extraction.
#[derive(Debug, Error)]
pub enum CertExtractError {
    #[error("failed to parse certificate: {0}")]
    ParseError(String),

    #[error("certificate does not contain a SPIFFE URI SAN")]
    MissingSpiffeId,

    #[error("certificate contains {0} SPIFFE URI SANs, expected one")]
    AmbiguousSpiffeId(usize),

    #[error("invalid certificate serial: {0}")]
    InvalidSerial(String),
}

/// Identity facts read from a leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertIdentity {
    pub spiffe_id: String,
    /// Serial as uppercase hex of the raw DER integer. Up to 20 octets.
    pub serial_hex: String,
    /// `notAfter` as a Unix timestamp.
    pub not_after: i64,
}

impl CertIdentity {
    /// The serial as issued by this CA. Wider serials from other issuers
    /// do not fit and are rejected.
    pub fn serial(&self) -> Result<Serial, CertExtractError> {
        self.serial_hex
            .parse::<Serial>()
            .map_err(|e| CertExtractError::InvalidSerial(e.to_string()))
    }
}

/// Extract the identity from the first certificate of a PEM document.
pub fn extract_identity_from_pem(cert_pem: &str) -> Result<CertIdentity, CertExtractError> {
    let pem = ::pem::parse(cert_pem).map_err(|e| CertExtractError::ParseError(e.to_string()))?;
    extract_identity_from_cert(pem.contents())
}

/// Extract the identity from a DER-encoded X.509 certificate.
///
/// Exactly one `spiffe://` URI SAN must be present.
pub fn extract_identity_from_cert(cert_der: &[u8]) -> Result<CertIdentity, CertExtractError> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| CertExtractError::ParseError(format!("{:?}", e)))?;

    let mut uris = spiffe_uris(&cert)?;
    let spiffe_id = match uris.len() {
        0 => return Err(CertExtractError::MissingSpiffeId),
        1 => uris.remove(0),
        n => return Err(CertExtractError::AmbiguousSpiffeId(n)),
    };

    Ok(CertIdentity {
        spiffe_id,
        serial_hex: hex::encode_upper(cert.raw_serial()),
        not_after: cert.validity().not_after.timestamp(),
    })
}

fn spiffe_uris(cert: &X509Certificate<'_>) -> Result<Vec<String>, CertExtractError> {
    let san = cert
        .subject_alternative_name()
        .map_err(|e| CertExtractError::ParseError(format!("SAN extension: {:?}", e)))?;

    Ok(san
        .map(|ext| {
            ext.value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::URI(uri) if uri.starts_with("spiffe://") => Some(uri.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default())
}
