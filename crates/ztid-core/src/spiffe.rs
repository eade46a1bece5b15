//! SPIFFE URI derivation and normalization.

use crate::ids::ServiceId;

/// Authority prepended to bare paths.
pub const TRUST_DOMAIN_AUTHORITY: &str = "spiffe://demo";

/// Prefix for service-account identities in the default namespace.
pub const SERVICE_ACCOUNT_PREFIX: &str = "spiffe://demo/ns/default/sa/";

/// Identity used when no identifier is supplied.
pub const FALLBACK_SPIFFE_URI: &str = "spiffe://demo/ns/default/sa/unknown";

/// Derive the SPIFFE URI for a registered service.
///
/// The result is fixed at registration and stays the same across reissuance.
pub fn spiffe_id_for_service(service_id: &ServiceId) -> String {
    format!("{SERVICE_ACCOUNT_PREFIX}{service_id}")
}

/// Canonicalize a raw identifier into a `spiffe://` URI.
///
/// First match wins:
/// 1. empty -> [`FALLBACK_SPIFFE_URI`]
/// 2. starts with `spiffe:` -> unchanged
/// 3. starts with `/` -> [`TRUST_DOMAIN_AUTHORITY`] + input
/// 4. anything else -> `spiffe://` + input
pub fn normalize_spiffe_uri(raw: &str) -> String {
    if raw.is_empty() {
        FALLBACK_SPIFFE_URI.to_string()
    } else if raw.starts_with("spiffe:") {
        raw.to_string()
    } else if raw.starts_with('/') {
        format!("{TRUST_DOMAIN_AUTHORITY}{raw}")
    } else {
        format!("spiffe://{raw}")
    }
}
