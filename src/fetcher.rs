//! HTTP access for fetch workers.

use std::time::Duration;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// Abstraction over fetching one URL, enabling testability.
///
/// Implementations return the full response body on a 2xx response and an error for
/// anything else (network failure, timeout, non-success status).
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and return its body
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Production [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Build a client from the HTTP settings; concurrency itself is bounded by the gate
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()?;
        Ok(Self {
            client,
            timeout: config.request_timeout,
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = url::Url::parse(url).map_err(|e| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        // The timeout covers the whole attempt, body included
        let response = self
            .client
            .get(parsed)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}
