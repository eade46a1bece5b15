//! Token redemption against the registration authority.

use tracing::info;

use ztid_admin_client::RaClient;
use ztid_core::api::IssueResponse;

use crate::config::Config;
use crate::error::AgentError;

/// Redeem the bootstrap token once. A used or expired token is not retried.
pub async fn request_certificate(config: &Config) -> Result<IssueResponse, AgentError> {
    let client = RaClient::with_timeout(&config.ra_url, config.request_timeout)?;

    info!(
        service_id = %config.service_id,
        ra_url = %client.base_url(),
        "Requesting certificate"
    );

    let issued = client.issue(&config.bootstrap_token).await?;
    Ok(issued)
}
