//! Registration authority: register, issue, revoke and status.
//!
//! Issuance follows a three step protocol so that concurrent callers with
//! the same token see at most one success without serializing key
//! generation behind the registry lock:
//! 1. check-and-consume the token under the write lock
//! 2. sign the leaf with no lock held
//! 3. record the certificate under the write lock
//!
//! A consumed token is never refunded, even when signing fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use ztid_core::api::{
    ActiveCertResponse, IssueResponse, RegisterResponse, RevokeResponse, RevokedCertResponse,
    StatusResponse,
};
use ztid_core::{
    spiffe_id_for_service, IssuedCert, RevocationEntry, RevocationReason, Serial, ServiceId,
    ServiceIdentity, TokenStatus,
};

use crate::config::Config;
use crate::crypto::{
    generate_bootstrap_token, hash_token, token_fingerprint, BootstrapToken, CaArtifacts,
    CertificateAuthority, CrlManager, CrlSnapshot, LeafIssuer,
};
use crate::error::RaError;
use crate::state::Registry;

/// What a revoke request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeTarget {
    /// One serial, issued by this instance or not.
    Serial(Serial),
    /// Every certificate issued to the service.
    Service(ServiceId),
}

impl RevokeTarget {
    /// Build a target from optional request parameters.
    ///
    /// Empty values count as absent. A service takes precedence over a
    /// serial when both are given.
    pub fn from_params(serial: Option<&str>, service: Option<&str>) -> Result<Self, RaError> {
        let serial = serial.filter(|s| !s.is_empty());
        let service = service.filter(|s| !s.is_empty());

        match (serial, service) {
            (_, Some(service)) => Ok(Self::Service(ServiceId::parse(service)?)),
            (Some(serial), None) => Ok(Self::Serial(serial.parse()?)),
            (None, None) => Err(RaError::Validation(
                "either 'serial' or 'service' is required".to_string(),
            )),
        }
    }
}

/// Lifetimes applied by the registration authority.
#[derive(Debug, Clone)]
pub struct RaSettings {
    pub leaf_validity: Duration,
    pub token_ttl: Duration,
}

impl From<&Config> for RaSettings {
    fn from(config: &Config) -> Self {
        Self {
            leaf_validity: config.leaf_validity,
            token_ttl: config.token_ttl,
        }
    }
}

/// Coordinates identities, tokens, issued certificates and revocations.
pub struct RegistrationAuthority {
    registry: Arc<Registry>,
    issuer: Arc<dyn LeafIssuer>,
    crl: Arc<CrlManager>,
    settings: RaSettings,
}

impl RegistrationAuthority {
    pub fn new(
        registry: Arc<Registry>,
        issuer: Arc<dyn LeafIssuer>,
        crl: Arc<CrlManager>,
        settings: RaSettings,
    ) -> Self {
        Self {
            registry,
            issuer,
            crl,
            settings,
        }
    }

    /// Build an authority over the CA directory named in `config`.
    pub fn from_config(config: &Config) -> Self {
        let artifacts = CaArtifacts::new(&config.ca_dir);
        Self::new(
            Arc::new(Registry::new()),
            Arc::new(CertificateAuthority::new(artifacts.clone())),
            Arc::new(CrlManager::new(artifacts, config.crl_validity)),
            RaSettings::from(config),
        )
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Register a service and mint its bootstrap token.
    ///
    /// Re-registration keeps the identity (same SPIFFE URI and creation
    /// time), discards any unused tokens for the service and mints a new one.
    /// Certificates already issued are left alone.
    pub async fn register(&self, service_id: &str) -> Result<RegisterResponse, RaError> {
        let service_id = ServiceId::parse(service_id)?;
        let ttl = chrono::Duration::from_std(self.settings.token_ttl)
            .map_err(|e| RaError::Internal(format!("token TTL out of range: {e}")))?;

        let (plaintext, token_hash) = generate_bootstrap_token();
        let token = BootstrapToken::new(service_id.clone(), token_hash, ttl);
        let expires_at = token.expires_at;
        let fingerprint = token_fingerprint(&token.token_hash).to_string();

        let mut tables = self.registry.write().await;

        let identity = match tables.identity(&service_id) {
            Some(existing) => ServiceIdentity {
                active: true,
                ..existing.clone()
            },
            None => ServiceIdentity::new(service_id.clone()),
        };
        let spiffe_id = identity.spiffe_id.clone();
        let replaced = tables.remove_unused_tokens_for(&service_id, Utc::now());

        tables.put_identity(identity);
        tables.put_token(token);
        drop(tables);

        info!(
            service_id = %service_id,
            spiffe_id = %spiffe_id,
            token = %fingerprint,
            replaced_tokens = replaced,
            "Service registered"
        );

        Ok(RegisterResponse {
            bootstrap_token: plaintext,
            spiffe_id,
            expires_at,
        })
    }

    /// Redeem a bootstrap token for a freshly signed certificate.
    pub async fn issue(&self, token: &str) -> Result<IssueResponse, RaError> {
        if token.is_empty() {
            return Err(RaError::Auth("missing bootstrap token".to_string()));
        }
        let token_hash = hash_token(token);
        let fingerprint = token_fingerprint(&token_hash).to_string();

        // Phase 1: check and consume under the write lock
        let (service_id, spiffe_id) = {
            let mut tables = self.registry.write().await;
            let Some(entry) = tables.token_mut(&token_hash) else {
                warn!(token = %fingerprint, "Unknown bootstrap token presented");
                return Err(RaError::Auth("invalid bootstrap token".to_string()));
            };

            match entry.status_at(Utc::now()) {
                TokenStatus::Unused => {}
                TokenStatus::Used => {
                    warn!(
                        token = %fingerprint,
                        service_id = %entry.service_id,
                        "Bootstrap token reused"
                    );
                    return Err(RaError::Auth("bootstrap token already used".to_string()));
                }
                TokenStatus::Expired => {
                    warn!(
                        token = %fingerprint,
                        service_id = %entry.service_id,
                        "Bootstrap token expired"
                    );
                    return Err(RaError::Auth("bootstrap token expired".to_string()));
                }
            }

            entry.consume();
            let service_id = entry.service_id.clone();
            let spiffe_id = tables
                .identity(&service_id)
                .map(|identity| identity.spiffe_id.clone())
                .unwrap_or_else(|| spiffe_id_for_service(&service_id));

            info!(token = %fingerprint, service_id = %service_id, "Bootstrap token consumed");
            (service_id, spiffe_id)
        };

        // Phase 2: sign with no lock held
        let issuer = Arc::clone(&self.issuer);
        let validity = self.settings.leaf_validity;
        let leaf = tokio::task::spawn_blocking(move || issuer.issue_leaf(&spiffe_id, validity))
            .await?
            .map_err(|e| {
                error!(service_id = %service_id, error = %e, "Certificate issuance failed");
                RaError::from(e)
            })?;

        // Phase 3: record under the write lock
        let record = IssuedCert {
            serial: leaf.serial,
            service_id: service_id.clone(),
            spiffe_id: leaf.spiffe_id.clone(),
            cert_pem: leaf.cert_pem.clone(),
            key_pem: leaf.key_pem.clone(),
            chain_pem: leaf.chain_pem.clone(),
            issued_at: leaf.issued_at,
            expires_at: leaf.expires_at,
        };
        self.registry.write().await.put_cert(record);

        info!(
            service_id = %service_id,
            serial = %leaf.serial,
            spiffe_id = %leaf.spiffe_id,
            expires_at = %leaf.expires_at,
            "Certificate issued"
        );

        Ok(IssueResponse {
            cert_pem: leaf.cert_pem,
            key_pem: leaf.key_pem,
            chain_pem: leaf.chain_pem,
            serial: leaf.serial,
            expires_at: leaf.expires_at,
        })
    }

    /// Revoke one serial or every certificate of a service.
    ///
    /// Idempotent: a serial keeps its first revocation time and reason. All
    /// targeted serials are then published to the CRL, which skips ones it
    /// already lists, so repeating a revoke repairs a CRL update that failed.
    pub async fn revoke(
        &self,
        target: RevokeTarget,
        reason: RevocationReason,
    ) -> Result<RevokeResponse, RaError> {
        let entries = {
            let mut tables = self.registry.write().await;
            let serials = match &target {
                RevokeTarget::Serial(serial) => vec![*serial],
                RevokeTarget::Service(service_id) => tables.serials_for_service(service_id),
            };

            let mut entries = Vec::with_capacity(serials.len());
            for serial in serials {
                if tables.put_revocation(RevocationEntry::new(serial, reason)) {
                    info!(serial = %serial, reason = %reason, "Certificate revoked");
                }
                if let Some(entry) = tables.revocation(&serial) {
                    entries.push(entry.clone());
                }
            }
            entries
        };

        if entries.is_empty() {
            info!(revoke_target = ?target, "Revoke matched no certificates");
            return Ok(RevokeResponse {
                revoked: Vec::new(),
            });
        }

        let revoked: Vec<Serial> = entries.iter().map(|e| e.serial).collect();

        let crl = Arc::clone(&self.crl);
        tokio::task::spawn_blocking(move || crl.add_revocations(&entries))
            .await?
            .map_err(|e| {
                error!(error = %e, "Failed to publish revocations to CRL");
                RaError::from(e)
            })?;

        Ok(RevokeResponse { revoked })
    }

    /// Issued-but-not-revoked certificates and revocation records, by serial.
    pub async fn status(&self) -> StatusResponse {
        let tables = self.registry.read().await;

        let mut certs: Vec<ActiveCertResponse> = tables
            .certs()
            .filter(|cert| !tables.cert_status(&cert.serial).is_terminal())
            .map(|cert| ActiveCertResponse {
                serial: cert.serial,
                service_id: cert.service_id.clone(),
                spiffe_id: cert.spiffe_id.clone(),
                expires_at: cert.expires_at,
            })
            .collect();
        certs.sort_by_key(|c| c.serial);

        let mut revoked: Vec<RevokedCertResponse> = tables
            .revocations()
            .map(|entry| RevokedCertResponse {
                serial: entry.serial,
                service_id: tables.cert(&entry.serial).map(|c| c.service_id.clone()),
                revoked_at: entry.revoked_at,
                reason: entry.reason,
            })
            .collect();
        revoked.sort_by_key(|r| r.serial);

        StatusResponse { certs, revoked }
    }

    /// Make sure a CRL exists, creating an empty one if needed.
    pub async fn ensure_crl(&self) -> Result<CrlSnapshot, RaError> {
        let crl = Arc::clone(&self.crl);
        let snapshot = tokio::task::spawn_blocking(move || match crl.current()? {
            Some(snapshot) => Ok(snapshot),
            None => crl.create_empty(),
        })
        .await??;
        Ok(snapshot)
    }

    /// Re-sign the CRL with fresh update times.
    pub async fn refresh_crl(&self) -> Result<CrlSnapshot, RaError> {
        let crl = Arc::clone(&self.crl);
        let snapshot = tokio::task::spawn_blocking(move || crl.refresh()).await??;
        info!(crl_number = snapshot.number, "CRL refreshed");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{init_ca, CaError, HierarchyConfig, LeafCertificate, DEFAULT_CRL_VALIDITY};

    struct Fixture {
        _dir: tempfile::TempDir,
        artifacts: CaArtifacts,
        ra: Arc<RegistrationAuthority>,
    }

    fn settings() -> RaSettings {
        RaSettings {
            leaf_validity: Duration::from_secs(3600),
            token_ttl: Duration::from_secs(3600),
        }
    }

    fn fixture_with(issuer: Option<Arc<dyn LeafIssuer>>, settings: RaSettings) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = CaArtifacts::new(dir.path().join("ca"));
        init_ca(&artifacts, &HierarchyConfig::default()).unwrap();

        let issuer =
            issuer.unwrap_or_else(|| Arc::new(CertificateAuthority::new(artifacts.clone())));
        let crl = Arc::new(CrlManager::new(artifacts.clone(), DEFAULT_CRL_VALIDITY));
        let ra = RegistrationAuthority::new(Arc::new(Registry::new()), issuer, crl, settings);

        Fixture {
            _dir: dir,
            artifacts,
            ra: Arc::new(ra),
        }
    }

    fn fixture() -> Fixture {
        fixture_with(None, settings())
    }

    struct FailingIssuer;

    impl LeafIssuer for FailingIssuer {
        fn issue_leaf(&self, _: &str, _: Duration) -> Result<LeafCertificate, CaError> {
            Err(CaError::SignError("HSM unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_register_returns_token_and_spiffe_id() {
        let fx = fixture();
        let reg = fx.ra.register("checkout").await.unwrap();

        assert!(reg.bootstrap_token.starts_with(crate::crypto::TOKEN_PREFIX));
        assert_eq!(reg.spiffe_id, "spiffe://demo/ns/default/sa/checkout");

        let tables = fx.ra.registry().read().await;
        let identity = tables
            .identity(&ServiceId::parse("checkout").unwrap())
            .unwrap();
        assert!(identity.active);
        // Only the hash is stored
        assert_eq!(tables.tokens().count(), 1);
        assert!(tables.tokens().all(|t| t.token_hash != reg.bootstrap_token));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_service() {
        let fx = fixture();
        assert!(fx.ra.register("").await.unwrap_err().is_validation());
        assert!(fx.ra.register("bad/id").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_token_redeems_exactly_once() {
        let fx = fixture();
        let reg = fx.ra.register("checkout").await.unwrap();

        let issued = fx.ra.issue(&reg.bootstrap_token).await.unwrap();
        assert!(issued.cert_pem.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(issued.chain_pem.ends_with(
            &std::fs::read_to_string(fx.artifacts.cert_path(crate::crypto::INTERMEDIATE))
                .unwrap()
        ));

        let again = fx.ra.issue(&reg.bootstrap_token).await.unwrap_err();
        assert!(again.is_auth());

        let status = fx.ra.status().await;
        assert_eq!(status.certs.len(), 1);
        assert_eq!(status.certs[0].serial, issued.serial);
        assert_eq!(status.certs[0].spiffe_id, reg.spiffe_id);
    }

    #[tokio::test]
    async fn test_unknown_or_missing_token_is_auth_error() {
        let fx = fixture();
        assert!(fx.ra.issue("").await.unwrap_err().is_auth());
        assert!(fx.ra.issue("zt-bootstrap-nope").await.unwrap_err().is_auth());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_issue_same_token_single_success() {
        let fx = fixture();
        let reg = fx.ra.register("checkout").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ra = Arc::clone(&fx.ra);
            let token = reg.bootstrap_token.clone();
            handles.push(tokio::spawn(async move { ra.issue(&token).await }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert!(e.is_auth()),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(fx.ra.status().await.certs.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let fx = fixture_with(
            None,
            RaSettings {
                leaf_validity: Duration::from_secs(3600),
                token_ttl: Duration::ZERO,
            },
        );
        let reg = fx.ra.register("checkout").await.unwrap();
        let err = fx.ra.issue(&reg.bootstrap_token).await.unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("expired"));
    }

    #[tokio::test]
    async fn test_failed_issuance_consumes_token() {
        let fx = fixture_with(Some(Arc::new(FailingIssuer)), settings());
        let reg = fx.ra.register("checkout").await.unwrap();

        let err = fx.ra.issue(&reg.bootstrap_token).await.unwrap_err();
        assert!(matches!(err, RaError::Internal(_)));
        assert!(fx.ra.status().await.certs.is_empty());

        // No refund
        assert!(fx.ra.issue(&reg.bootstrap_token).await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_reregistration_keeps_identity_and_replaces_token() {
        let fx = fixture();
        let first = fx.ra.register("checkout").await.unwrap();
        let issued = {
            let r = fx.ra.register("checkout").await.unwrap();
            assert_eq!(r.spiffe_id, first.spiffe_id);
            r
        };

        // The earlier unused token no longer works, the new one does
        assert!(fx.ra.issue(&first.bootstrap_token).await.unwrap_err().is_auth());
        fx.ra.issue(&issued.bootstrap_token).await.unwrap();

        // Certificates survive a later re-registration
        fx.ra.register("checkout").await.unwrap();
        assert_eq!(fx.ra.status().await.certs.len(), 1);
    }

    #[tokio::test]
    async fn test_revoke_by_service_is_scoped_and_idempotent() {
        let fx = fixture();
        for service in ["checkout", "checkout", "payments"] {
            let reg = fx.ra.register(service).await.unwrap();
            fx.ra.issue(&reg.bootstrap_token).await.unwrap();
        }

        let target = RevokeTarget::Service(ServiceId::parse("checkout").unwrap());
        let first = fx
            .ra
            .revoke(target.clone(), RevocationReason::KeyCompromise)
            .await
            .unwrap();
        assert_eq!(first.revoked.len(), 2);
        let after_first = fx.ra.status().await;

        let second = fx
            .ra
            .revoke(target, RevocationReason::Superseded)
            .await
            .unwrap();
        assert_eq!(second.revoked, first.revoked);
        let after_second = fx.ra.status().await;

        assert_eq!(after_first.revoked, after_second.revoked);
        assert_eq!(after_second.revoked.len(), 2);
        assert!(after_second
            .revoked
            .iter()
            .all(|r| r.reason == RevocationReason::KeyCompromise));
        assert_eq!(after_second.certs.len(), 1);
        assert_eq!(after_second.certs[0].service_id.as_str(), "payments");

        // Published to the CRL once
        let crl = CrlManager::new(fx.artifacts.clone(), DEFAULT_CRL_VALIDITY)
            .current()
            .unwrap()
            .unwrap();
        assert_eq!(crl.entries.len(), 2);
        assert_eq!(crl.number, 2);
        for serial in &first.revoked {
            assert!(crl.contains(serial));
        }
    }

    #[tokio::test]
    async fn test_revoke_single_serial() {
        let fx = fixture();
        let reg = fx.ra.register("checkout").await.unwrap();
        let issued = fx.ra.issue(&reg.bootstrap_token).await.unwrap();

        let response = fx
            .ra
            .revoke(RevokeTarget::Serial(issued.serial), RevocationReason::default())
            .await
            .unwrap();
        assert_eq!(response.revoked, vec![issued.serial]);

        let status = fx.ra.status().await;
        assert!(status.certs.is_empty());
        assert_eq!(status.revoked.len(), 1);
        assert_eq!(
            status.revoked[0].service_id.as_ref().map(|s| s.as_str()),
            Some("checkout")
        );
    }

    #[tokio::test]
    async fn test_revoke_unknown_serial_is_recorded() {
        let fx = fixture();
        let serial = Serial::generate();
        fx.ra
            .revoke(RevokeTarget::Serial(serial), RevocationReason::default())
            .await
            .unwrap();

        let status = fx.ra.status().await;
        assert_eq!(status.revoked.len(), 1);
        assert_eq!(status.revoked[0].service_id, None);
    }

    #[tokio::test]
    async fn test_revoke_retry_repairs_crl() {
        let fx = fixture();
        let reg = fx.ra.register("checkout").await.unwrap();
        let issued = fx.ra.issue(&reg.bootstrap_token).await.unwrap();

        // Break the CRL so the first publish fails after recording
        fx.artifacts.write_crl("garbage").unwrap();
        let target = RevokeTarget::Serial(issued.serial);
        assert!(fx
            .ra
            .revoke(target.clone(), RevocationReason::default())
            .await
            .is_err());
        assert_eq!(fx.ra.status().await.revoked.len(), 1);

        std::fs::remove_file(fx.artifacts.crl_path()).unwrap();
        fx.ra
            .revoke(target, RevocationReason::default())
            .await
            .unwrap();
        let crl = CrlManager::new(fx.artifacts.clone(), DEFAULT_CRL_VALIDITY)
            .current()
            .unwrap()
            .unwrap();
        assert!(crl.contains(&issued.serial));
    }

    #[test]
    fn test_revoke_target_from_params() {
        let serial = Serial::generate().to_string();

        assert_eq!(
            RevokeTarget::from_params(Some(&serial), Some("checkout")).unwrap(),
            RevokeTarget::Service(ServiceId::parse("checkout").unwrap())
        );
        assert!(matches!(
            RevokeTarget::from_params(Some(&serial), None).unwrap(),
            RevokeTarget::Serial(_)
        ));
        assert!(RevokeTarget::from_params(None, None)
            .unwrap_err()
            .is_validation());
        assert!(RevokeTarget::from_params(Some(""), Some(""))
            .unwrap_err()
            .is_validation());
        assert!(RevokeTarget::from_params(Some("xyz"), None)
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn test_refresh_crl_bumps_number() {
        let fx = fixture();
        let before = fx.ra.ensure_crl().await.unwrap();
        let after = fx.ra.refresh_crl().await.unwrap();
        assert_eq!(after.number, before.number + 1);
    }
}
