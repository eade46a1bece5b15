//! Bootstrap token generation and validation.
//!
//! Bootstrap tokens gate certificate issuance. They are single-use and
//! time-limited; only the SHA-256 hash of a token is ever stored.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use ztid_core::{ServiceId, TokenStatus};

/// Prefix that makes bootstrap tokens recognizable in configs and logs.
pub const TOKEN_PREFIX: &str = "zt-bootstrap-";

/// A bootstrap token stored by the registration authority.
#[derive(Debug, Clone)]
pub struct BootstrapToken {
    /// Service the token was minted for.
    pub service_id: ServiceId,

    /// SHA-256 hash of the token (hex encoded).
    pub token_hash: String,

    /// When the token was created.
    pub created_at: DateTime<Utc>,

    /// When the token expires.
    pub expires_at: DateTime<Utc>,

    /// Whether the token has been consumed.
    pub used: bool,
}

impl BootstrapToken {
    /// Create a new bootstrap token entry from a token hash.
    pub fn new(service_id: ServiceId, token_hash: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            service_id,
            token_hash,
            created_at: now,
            expires_at: now + ttl,
            used: false,
        }
    }

    /// Status at `now`. A used token stays used after its expiry.
    pub fn status_at(&self, now: DateTime<Utc>) -> TokenStatus {
        if self.used {
            TokenStatus::Used
        } else if now >= self.expires_at {
            TokenStatus::Expired
        } else {
            TokenStatus::Unused
        }
    }

    /// Mark the token as consumed.
    pub fn consume(&mut self) {
        self.used = true;
    }
}

/// Generate a new bootstrap token.
///
/// Returns a tuple of (plaintext_token, token_hash).
/// The plaintext is handed to the operator once; only the hash is kept.
pub fn generate_bootstrap_token() -> (String, String) {
    // 256 bits of randomness
    let mut token_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut token_bytes);

    let plaintext = format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(token_bytes));
    let token_hash = hash_token(&plaintext);

    (plaintext, token_hash)
}

/// Hash a token using SHA-256.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Short, log-safe fingerprint of a token hash.
pub fn token_fingerprint(token_hash: &str) -> &str {
    token_hash.get(..12).unwrap_or(token_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ServiceId {
        ServiceId::parse("checkout").unwrap()
    }

    #[test]
    fn test_generate_bootstrap_token() {
        let (plaintext, hash) = generate_bootstrap_token();

        assert!(plaintext.starts_with(TOKEN_PREFIX));
        // 32 bytes base64 encoded
        assert_eq!(plaintext.len(), TOKEN_PREFIX.len() + 43);

        // SHA-256 hex
        assert_eq!(hash.len(), 64);
        assert_eq!(hash_token(&plaintext), hash);
    }

    #[test]
    fn test_tokens_are_unique() {
        let (a, _) = generate_bootstrap_token();
        let (b, _) = generate_bootstrap_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_validity() {
        let token = BootstrapToken::new(service(), "test_hash".to_string(), Duration::hours(1));

        assert!(token.status_at(Utc::now()).is_redeemable());
        assert!(!token.used);
        assert_eq!(token.status_at(Utc::now()), TokenStatus::Unused);
    }

    #[test]
    fn test_token_consume() {
        let mut token =
            BootstrapToken::new(service(), "test_hash".to_string(), Duration::hours(1));

        token.consume();
        assert!(!token.status_at(Utc::now()).is_redeemable());
        assert_eq!(token.status_at(Utc::now()), TokenStatus::Used);
    }

    #[test]
    fn test_token_expiry() {
        let token = BootstrapToken::new(service(), "test_hash".to_string(), Duration::hours(1));
        let later = token.created_at + Duration::hours(2);

        assert_eq!(token.status_at(later), TokenStatus::Expired);
        assert_eq!(token.status_at(token.expires_at), TokenStatus::Expired);
    }

    #[test]
    fn test_fingerprint() {
        let hash = hash_token("zt-bootstrap-abc");
        assert_eq!(token_fingerprint(&hash).len(), 12);
        assert_eq!(token_fingerprint("abc"), "abc");
    }
}
