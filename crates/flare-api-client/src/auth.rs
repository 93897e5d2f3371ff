//! Token providers injected into the API client.
//!
//! Auth state is never read from globals inside the coordinator; whoever builds
//! the client decides where tokens come from.

use async_trait::async_trait;
use flare_core::UploadError;
use std::fmt::{Debug, Formatter, Result as FmtResult};

/// Source of the bearer token sent with broker requests.
#[async_trait]
pub trait TokenProvider: Send + Sync + Debug {
    /// Current token, or `None` to send the request unauthenticated.
    async fn token(&self) -> Result<Option<String>, UploadError>;
}

/// A fixed token, e.g. one obtained at sign-in.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl Debug for StaticToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("StaticToken").field(&"<redacted>").finish()
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<Option<String>, UploadError> {
        Ok(Some(self.0.clone()))
    }
}

/// Reads FLARE_API_TOKEN (or API_TOKEN) on every request, so a rotated token is picked up.
#[derive(Clone, Debug, Default)]
pub struct EnvToken;

#[async_trait]
impl TokenProvider for EnvToken {
    async fn token(&self) -> Result<Option<String>, UploadError> {
        std::env::var("FLARE_API_TOKEN")
            .or_else(|_| std::env::var("API_TOKEN"))
            .map(Some)
            .map_err(|_| {
                UploadError::Auth("Missing API token. Set FLARE_API_TOKEN or API_TOKEN".to_string())
            })
    }
}

/// Sends every request without credentials.
#[derive(Clone, Debug, Default)]
pub struct NoAuth;

#[async_trait]
impl TokenProvider for NoAuth {
    async fn token(&self) -> Result<Option<String>, UploadError> {
        Ok(None)
    }
}
