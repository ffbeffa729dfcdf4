//! Network transport for stores that fetch over HTTP

use async_trait::async_trait;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{Result, StoreError};

/// Retrieves the encoded bytes behind a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the body at `url`
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success response.
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// [`Fetcher`] backed by a shared `reqwest` client
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with the configured timeout and User-Agent
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Image request rejected");
            return Err(StoreError::HttpStatus {
                key: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.bytes().await?;
        tracing::debug!(url = %url, bytes = body.len(), "Image body received");
        Ok(body.to_vec())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
