//! Certificate revocation list management.
//!
//! The CRL is signed by the intermediate and stored as `crl.pem`. Every
//! change re-reads the current list, merges, bumps the CRL number and
//! re-signs, so list numbers only ever increase.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rcgen::{CertificateRevocationListParams, KeyIdMethod, RevokedCertParams, SerialNumber};
use time::OffsetDateTime;
use tracing::{debug, info};
use x509_parser::prelude::{CertificateRevocationList as ParsedCrl, FromDer};

use ztid_core::{RevocationEntry, RevocationReason, Serial};

use super::artifacts::{CaArtifacts, SigningMaterial, INTERMEDIATE};
use super::CaError;

/// Lifetime of a freshly signed CRL.
pub const DEFAULT_CRL_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Decoded view of a CRL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlSnapshot {
    pub number: u64,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
    pub entries: Vec<RevocationEntry>,
}

impl CrlSnapshot {
    pub fn contains(&self, serial: &Serial) -> bool {
        self.entries.iter().any(|e| &e.serial == serial)
    }
}

/// Maintains the intermediate's CRL artifact.
pub struct CrlManager {
    artifacts: CaArtifacts,
    validity: Duration,
    /// Serializes read-merge-sign-write cycles.
    update_lock: Mutex<()>,
}

impl CrlManager {
    pub fn new(artifacts: CaArtifacts, validity: Duration) -> Self {
        Self {
            artifacts,
            validity,
            update_lock: Mutex::new(()),
        }
    }

    /// Write a CRL with number 1 and no entries, replacing any current list.
    pub fn create_empty(&self) -> Result<CrlSnapshot, CaError> {
        let _guard = self.lock();
        let signer = self.artifacts.load_signer(INTERMEDIATE)?;
        let (pem, snapshot) = render_crl(&signer, 1, Vec::new(), self.validity)?;
        self.artifacts.write_crl(&pem)?;
        info!(crl_number = 1, "Created empty CRL");
        Ok(snapshot)
    }

    /// Add one revoked serial.
    pub fn add_revocation(
        &self,
        serial: Serial,
        reason: RevocationReason,
        revoked_at: DateTime<Utc>,
    ) -> Result<CrlSnapshot, CaError> {
        self.add_revocations(&[RevocationEntry {
            serial,
            revoked_at,
            reason,
        }])
    }

    /// Merge entries into the current CRL.
    ///
    /// Serials already listed are skipped. When nothing is new the list is
    /// left untouched and the current snapshot is returned. A missing CRL
    /// counts as an empty list numbered 0.
    pub fn add_revocations(&self, entries: &[RevocationEntry]) -> Result<CrlSnapshot, CaError> {
        let _guard = self.lock();
        let current = self.read_current()?;

        let (number, mut listed) = match &current {
            Some(snapshot) => (snapshot.number, snapshot.entries.clone()),
            None => (0, Vec::new()),
        };

        let mut added = 0usize;
        for entry in entries {
            if !listed.iter().any(|e| e.serial == entry.serial) {
                listed.push(entry.clone());
                added += 1;
            }
        }

        if added == 0 {
            if let Some(snapshot) = current {
                debug!(crl_number = snapshot.number, "CRL already lists all serials");
                return Ok(snapshot);
            }
        }

        let signer = self.artifacts.load_signer(INTERMEDIATE)?;
        let (pem, snapshot) = render_crl(&signer, number + 1, listed, self.validity)?;
        self.artifacts.write_crl(&pem)?;
        info!(
            crl_number = snapshot.number,
            added,
            total = snapshot.entries.len(),
            "CRL re-signed with new revocations"
        );
        Ok(snapshot)
    }

    /// Re-sign the current entries with fresh update times.
    pub fn refresh(&self) -> Result<CrlSnapshot, CaError> {
        let _guard = self.lock();
        let (number, entries) = match self.read_current()? {
            Some(snapshot) => (snapshot.number, snapshot.entries),
            None => (0, Vec::new()),
        };

        let signer = self.artifacts.load_signer(INTERMEDIATE)?;
        let (pem, snapshot) = render_crl(&signer, number + 1, entries, self.validity)?;
        self.artifacts.write_crl(&pem)?;
        debug!(crl_number = snapshot.number, "CRL refreshed");
        Ok(snapshot)
    }

    /// Decode the current CRL, if any.
    pub fn current(&self) -> Result<Option<CrlSnapshot>, CaError> {
        self.read_current()
    }

    fn read_current(&self) -> Result<Option<CrlSnapshot>, CaError> {
        self.artifacts
            .read_crl()?
            .map(|pem| parse_crl_pem(&pem))
            .transpose()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.update_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sign a CRL over `entries` and return its PEM with the decoded view.
pub(crate) fn render_crl(
    signer: &SigningMaterial,
    number: u64,
    entries: Vec<RevocationEntry>,
    validity: Duration,
) -> Result<(String, CrlSnapshot), CaError> {
    let this_update = truncate_to_second(OffsetDateTime::now_utc());
    let validity = time::Duration::try_from(validity)
        .map_err(|e| CaError::InvalidParams(format!("CRL validity: {e}")))?;
    let next_update = this_update + validity;

    let revoked_certs = entries
        .iter()
        .map(|entry| {
            Ok(RevokedCertParams {
                serial_number: SerialNumber::from(entry.serial.to_be_bytes()),
                revocation_time: to_offset(entry.revoked_at)?,
                reason_code: Some(to_rcgen_reason(entry.reason)),
                invalidity_date: None,
            })
        })
        .collect::<Result<Vec<_>, CaError>>()?;

    let params = CertificateRevocationListParams {
        this_update,
        next_update,
        crl_number: SerialNumber::from(minimal_be_bytes(number)),
        issuing_distribution_point: None,
        revoked_certs,
        key_identifier_method: KeyIdMethod::Sha256,
    };

    let crl = params
        .signed_by(&signer.cert, &signer.key)
        .map_err(|e| CaError::SignError(e.to_string()))?;
    let pem = ::pem::encode(&::pem::Pem::new("X509 CRL", crl.der().to_vec()));

    let snapshot = CrlSnapshot {
        number,
        this_update: to_utc(this_update),
        next_update: Some(to_utc(next_update)),
        entries: entries
            .into_iter()
            .map(|e| RevocationEntry {
                revoked_at: truncate_utc(e.revoked_at),
                ..e
            })
            .collect(),
    };

    Ok((pem, snapshot))
}

/// Decode a PEM CRL.
pub fn parse_crl_pem(pem: &str) -> Result<CrlSnapshot, CaError> {
    let block = ::pem::parse(pem).map_err(|e| CaError::ParseCrl(e.to_string()))?;
    parse_crl_der(block.contents())
}

/// Decode a DER CRL.
pub fn parse_crl_der(der: &[u8]) -> Result<CrlSnapshot, CaError> {
    let (_, crl) = ParsedCrl::from_der(der).map_err(|e| CaError::ParseCrl(e.to_string()))?;

    let number = crl
        .crl_number()
        .map(|n| {
            n.to_bytes_be()
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
        })
        .unwrap_or(0);

    let entries = crl
        .iter_revoked_certificates()
        .map(|revoked| {
            let serial = Serial::from_be_bytes(revoked.raw_serial())
                .map_err(|e| CaError::ParseCrl(e.to_string()))?;
            let reason = revoked
                .reason_code()
                .and_then(|(_, code)| RevocationReason::from_code(code.0))
                .unwrap_or_default();
            Ok(RevocationEntry {
                serial,
                revoked_at: from_timestamp(revoked.revocation_date.timestamp()),
                reason,
            })
        })
        .collect::<Result<Vec<_>, CaError>>()?;

    Ok(CrlSnapshot {
        number,
        this_update: from_timestamp(crl.last_update().timestamp()),
        next_update: crl.next_update().map(|t| from_timestamp(t.timestamp())),
        entries,
    })
}

fn minimal_be_bytes(n: u64) -> Vec<u8> {
    let bytes: Vec<u8> = n.to_be_bytes().into_iter().skip_while(|b| *b == 0).collect();
    if bytes.is_empty() {
        vec![0]
    } else {
        bytes
    }
}

fn to_rcgen_reason(reason: RevocationReason) -> rcgen::RevocationReason {
    match reason {
        RevocationReason::Unspecified => rcgen::RevocationReason::Unspecified,
        RevocationReason::KeyCompromise => rcgen::RevocationReason::KeyCompromise,
        RevocationReason::CaCompromise => rcgen::RevocationReason::CaCompromise,
        RevocationReason::AffiliationChanged => rcgen::RevocationReason::AffiliationChanged,
        RevocationReason::Superseded => rcgen::RevocationReason::Superseded,
        RevocationReason::CessationOfOperation => rcgen::RevocationReason::CessationOfOperation,
        RevocationReason::CertificateHold => rcgen::RevocationReason::CertificateHold,
        RevocationReason::RemoveFromCrl => rcgen::RevocationReason::RemoveFromCrl,
        RevocationReason::PrivilegeWithdrawn => rcgen::RevocationReason::PrivilegeWithdrawn,
        RevocationReason::AaCompromise => rcgen::RevocationReason::AaCompromise,
    }
}

// ============================================================================
// Time conversions (X.509 times have second precision)
// ============================================================================

pub(crate) fn truncate_to_second(t: OffsetDateTime) -> OffsetDateTime {
    t.replace_nanosecond(0).unwrap_or(t)
}

pub(crate) fn to_utc(t: OffsetDateTime) -> DateTime<Utc> {
    from_timestamp(t.unix_timestamp())
}

pub(crate) fn from_timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

fn truncate_utc(t: DateTime<Utc>) -> DateTime<Utc> {
    from_timestamp(t.timestamp())
}

fn to_offset(t: DateTime<Utc>) -> Result<OffsetDateTime, CaError> {
    OffsetDateTime::from_unix_timestamp(t.timestamp())
        .map_err(|e| CaError::InvalidParams(format!("timestamp out of range: {e}")))
}
