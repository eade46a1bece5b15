//! Certificate authority: hierarchy, leaf issuance, revocation lists and
//! bootstrap tokens.

mod artifacts;
mod cert_extractor;
mod crl;
mod error;
mod hierarchy;
mod issuer;
mod token;

pub use artifacts::{CaArtifacts, SigningMaterial, CRL_FILE, INTERMEDIATE, ROOT, TRUST_BUNDLE_FILE};
pub use cert_extractor::{
    extract_identity_from_cert, extract_identity_from_pem, CertExtractError, CertIdentity,
};
pub use crl::{parse_crl_der, parse_crl_pem, CrlManager, CrlSnapshot, DEFAULT_CRL_VALIDITY};
pub use error::CaError;
pub use hierarchy::{init_ca, HierarchyConfig, InitializedCa};
pub use issuer::{CertificateAuthority, LeafCertificate, LeafIssuer, DEFAULT_LEAF_VALIDITY};
pub use token::{
    generate_bootstrap_token, hash_token, token_fingerprint, BootstrapToken, TOKEN_PREFIX,
};
