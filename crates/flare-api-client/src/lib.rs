//! HTTP client for the Flare API.
//!
//! Provides a small client with an injected token provider plus the
//! `MediaUploader`, which drives a file through the three upload phases
//! (initiate, transfer, complete). The CLI uses this crate directly.

pub mod auth;
pub mod upload;

use anyhow::{Context, Result};
use flare_core::ClientConfig;
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;

pub use auth::{EnvToken, NoAuth, StaticToken, TokenProvider};
pub use upload::MediaUploader;

/// Header carrying the per-upload correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP client for the Flare API with injected auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    transfer_client: Client,
    config: ClientConfig,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let transfer_client = Client::builder()
            .timeout(config.transfer_timeout)
            .build()
            .context("Failed to create HTTP transfer client")?;

        Ok(Self {
            client,
            transfer_client,
            config,
            tokens,
        })
    }

    /// Create client from environment (see `ClientConfig::from_env`), reading the
    /// bearer token from FLARE_API_TOKEN or API_TOKEN at request time.
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        Self::new(config, Arc::new(EnvToken))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Absolute URL for an API path below the version prefix (e.g. "/uploads/initiate").
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.config.base_url,
            self.config.api_prefix(),
            path
        )
    }

    /// Resolve a destination handed out by the backend; relative paths are
    /// taken against the base URL.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.config.base_url, url)
        } else {
            url.to_string()
        }
    }

    /// Client for initiate/complete calls.
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Client with the longer transfer timeout.
    pub fn transfer_http(&self) -> &Client {
        &self.transfer_client
    }

    /// Attach the provider's bearer token, if it has one.
    pub async fn authorize(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<RequestBuilder, flare_core::UploadError> {
        match self.tokens.token().await? {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Ok(request),
        }
    }
}

/// Read a non-success response body for error reporting.
pub(crate) async fn error_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string())
}
