//! Shared application state.
//!
//! The registry owns the four entity tables behind a single reader/writer
//! lock: exclusive for any mutation, shared for pure reads.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ztid_core::{CertStatus, IssuedCert, RevocationEntry, Serial, ServiceId, ServiceIdentity};

use crate::crypto::BootstrapToken;
use crate::service::RegistrationAuthority;

/// The four keyed collections of the registration authority.
#[derive(Debug, Default)]
pub struct Tables {
    /// Registered services indexed by ServiceId.
    identities: HashMap<ServiceId, ServiceIdentity>,

    /// Bootstrap tokens indexed by token hash.
    tokens: HashMap<String, BootstrapToken>,

    /// Issued certificates indexed by Serial.
    certs: HashMap<Serial, IssuedCert>,

    /// Revocations indexed by Serial.
    revocations: HashMap<Serial, RevocationEntry>,
}

impl Tables {
    // ------------------------------------------------------------------
    // Identities
    // ------------------------------------------------------------------

    pub fn identity(&self, id: &ServiceId) -> Option<&ServiceIdentity> {
        self.identities.get(id)
    }

    pub fn put_identity(&mut self, identity: ServiceIdentity) {
        self.identities.insert(identity.id.clone(), identity);
    }

    pub fn identities(&self) -> impl Iterator<Item = &ServiceIdentity> {
        self.identities.values()
    }

    // ------------------------------------------------------------------
    // Bootstrap tokens
    // ------------------------------------------------------------------

    pub fn token_mut(&mut self, token_hash: &str) -> Option<&mut BootstrapToken> {
        self.tokens.get_mut(token_hash)
    }

    pub fn put_token(&mut self, token: BootstrapToken) {
        self.tokens.insert(token.token_hash.clone(), token);
    }

    pub fn tokens(&self) -> impl Iterator<Item = &BootstrapToken> {
        self.tokens.values()
    }

    /// Drop every still-redeemable token minted for `service_id`.
    ///
    /// Used and expired tokens are kept as history.
    pub fn remove_unused_tokens_for(&mut self, service_id: &ServiceId, now: DateTime<Utc>) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| {
            &token.service_id != service_id || !token.status_at(now).is_redeemable()
        });
        before - self.tokens.len()
    }

    // ------------------------------------------------------------------
    // Issued certificates
    // ------------------------------------------------------------------

    pub fn cert(&self, serial: &Serial) -> Option<&IssuedCert> {
        self.certs.get(serial)
    }

    pub fn put_cert(&mut self, cert: IssuedCert) {
        self.certs.insert(cert.serial, cert);
    }

    pub fn certs(&self) -> impl Iterator<Item = &IssuedCert> {
        self.certs.values()
    }

    /// Serials of every certificate issued to `service_id`, revoked or not.
    pub fn serials_for_service(&self, service_id: &ServiceId) -> Vec<Serial> {
        let mut serials: Vec<Serial> = self
            .certs
            .values()
            .filter(|cert| &cert.service_id == service_id)
            .map(|cert| cert.serial)
            .collect();
        serials.sort();
        serials
    }

    // ------------------------------------------------------------------
    // Revocations
    // ------------------------------------------------------------------

    pub fn revocation(&self, serial: &Serial) -> Option<&RevocationEntry> {
        self.revocations.get(serial)
    }

    pub fn is_revoked(&self, serial: &Serial) -> bool {
        self.revocations.contains_key(serial)
    }

    pub fn cert_status(&self, serial: &Serial) -> CertStatus {
        if self.is_revoked(serial) {
            CertStatus::Revoked
        } else {
            CertStatus::Active
        }
    }

    /// Record a revocation. The first record for a serial wins.
    ///
    /// Returns true if the serial was not revoked before.
    pub fn put_revocation(&mut self, entry: RevocationEntry) -> bool {
        if self.revocations.contains_key(&entry.serial) {
            return false;
        }
        self.revocations.insert(entry.serial, entry);
        true
    }

    pub fn revocations(&self) -> impl Iterator<Item = &RevocationEntry> {
        self.revocations.values()
    }
}

/// In-memory store of identities, tokens, certificates and revocations.
///
/// Constructed once at startup and handed to the registration authority.
#[derive(Debug, Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared access for pure reads.
    pub async fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().await
    }

    /// Exclusive access for mutations.
    pub async fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().await
    }
}

/// Shared application state.
pub struct AppState {
    /// Registration authority backing the HTTP API.
    pub ra: RegistrationAuthority,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(ra: RegistrationAuthority) -> Arc<Self> {
        Arc::new(Self { ra })
    }
}
