//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::fmt::Write;
use std::sync::Arc;

use chrono::Utc;

use ztid_core::{CertStatus, TokenStatus};

use crate::state::{AppState, Tables};

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let tables = state.ra.registry().read().await;
    let mut output = String::new();

    collect_identity_metrics(&tables, &mut output);
    collect_token_metrics(&tables, &mut output);
    collect_cert_metrics(&tables, &mut output);

    output
}

/// Registered service count.
fn collect_identity_metrics(tables: &Tables, output: &mut String) {
    let registered = tables.identities().count();

    writeln!(
        output,
        "# HELP ztid_identities_registered Number of registered services"
    )
    .ok();
    writeln!(output, "# TYPE ztid_identities_registered gauge").ok();
    writeln!(output, "ztid_identities_registered {registered}").ok();
}

/// Bootstrap tokens by status.
fn collect_token_metrics(tables: &Tables, output: &mut String) {
    let now = Utc::now();
    let mut unused = 0u64;
    let mut used = 0u64;
    let mut expired = 0u64;

    for token in tables.tokens() {
        match token.status_at(now) {
            TokenStatus::Unused => unused += 1,
            TokenStatus::Used => used += 1,
            TokenStatus::Expired => expired += 1,
        }
    }

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP ztid_bootstrap_tokens Number of bootstrap tokens by status"
    )
    .ok();
    writeln!(output, "# TYPE ztid_bootstrap_tokens gauge").ok();
    writeln!(output, "ztid_bootstrap_tokens{{status=\"unused\"}} {unused}").ok();
    writeln!(output, "ztid_bootstrap_tokens{{status=\"used\"}} {used}").ok();
    writeln!(output, "ztid_bootstrap_tokens{{status=\"expired\"}} {expired}").ok();
}

/// Issued certificates by status, plus revocations of unknown serials.
fn collect_cert_metrics(tables: &Tables, output: &mut String) {
    let mut active = 0u64;
    let mut revoked = 0u64;

    for cert in tables.certs() {
        match tables.cert_status(&cert.serial) {
            CertStatus::Active => active += 1,
            CertStatus::Revoked => revoked += 1,
        }
    }
    let revocations = tables.revocations().count();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP ztid_certificates Number of issued certificates by status"
    )
    .ok();
    writeln!(output, "# TYPE ztid_certificates gauge").ok();
    writeln!(output, "ztid_certificates{{status=\"active\"}} {active}").ok();
    writeln!(output, "ztid_certificates{{status=\"revoked\"}} {revoked}").ok();

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP ztid_revocations_total Number of revocation records"
    )
    .ok();
    writeln!(output, "# TYPE ztid_revocations_total gauge").ok();
    writeln!(output, "ztid_revocations_total {revocations}").ok();
}
