//! HTTP client for the registration authority REST API.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use ztid_core::api::{
    ErrorResponse, HealthResponse, IssueResponse, RegisterResponse, RevokeResponse, StatusResponse,
    BOOTSTRAP_TOKEN_HEADER,
};
use ztid_core::{RevocationReason, Serial, ServiceId};

use crate::error::ClientError;

/// Client for the registration authority API.
#[derive(Debug, Clone)]
pub struct RaClient {
    inner: reqwest::Client,
    base_url: String,
}

impl RaClient {
    /// Create a new client with no request timeout.
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client whose requests fail after `timeout`.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        Ok(Self {
            inner,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the registration authority is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let url = self.url("/health");
        debug!(url = %url, "Checking health");

        let response = send(self.inner.get(&url)).await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let health: HealthResponse = json(response).await?;
        Ok(health.status == "ok")
    }

    /// `POST /v1/register?service=<id>`
    pub async fn register(&self, service_id: &ServiceId) -> Result<RegisterResponse, ClientError> {
        let url = self.url("/v1/register");
        debug!(url = %url, service_id = %service_id, "Registering service");

        let request = self
            .inner
            .post(&url)
            .query(&[("service", service_id.as_str())]);
        json(send(request).await?).await
    }

    /// `POST /v1/issue` with the token in the bootstrap header.
    pub async fn issue(&self, bootstrap_token: &str) -> Result<IssueResponse, ClientError> {
        let url = self.url("/v1/issue");
        debug!(url = %url, "Requesting certificate");

        let request = self
            .inner
            .post(&url)
            .header(BOOTSTRAP_TOKEN_HEADER, bootstrap_token);
        json(send(request).await?).await
    }

    /// `POST /v1/revoke?serial=<s>`
    pub async fn revoke_serial(
        &self,
        serial: Serial,
        reason: RevocationReason,
    ) -> Result<RevokeResponse, ClientError> {
        self.revoke(&[("serial", serial.to_string()), ("reason", reason.to_string())])
            .await
    }

    /// `POST /v1/revoke?service=<id>`
    pub async fn revoke_service(
        &self,
        service_id: &ServiceId,
        reason: RevocationReason,
    ) -> Result<RevokeResponse, ClientError> {
        self.revoke(&[
            ("service", service_id.to_string()),
            ("reason", reason.to_string()),
        ])
        .await
    }

    /// `GET /v1/status`
    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        self.get_json("/v1/status").await
    }

    /// Get JSON from an endpoint.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "GET request");

        json(send(self.inner.get(&url)).await?).await
    }

    async fn revoke(&self, query: &[(&str, String)]) -> Result<RevokeResponse, ClientError> {
        let url = self.url("/v1/revoke");
        debug!(url = %url, "Revoking");

        json(send(self.inner.post(&url).query(query)).await?).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    request.send().await.map_err(|e| {
        if e.is_connect() {
            ClientError::Connection(e.to_string())
        } else {
            ClientError::Http(e)
        }
    })
}

/// Decode a success body, or turn an error body into [`ClientError::Api`].
async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::Serialization(e.to_string()))
}
