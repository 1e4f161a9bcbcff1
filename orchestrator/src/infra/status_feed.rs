//! HTTP status feed client.

use std::time::Duration;

use anyhow::{Context, Result};
use arena_common::StatusSnapshot;
use async_trait::async_trait;

use crate::application::ports::StatusFeed;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads the server list from the status service.
pub struct HttpStatusFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpStatusFeed {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building status feed client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl StatusFeed for HttpStatusFeed {
    async fn list(&self) -> Result<Vec<StatusSnapshot>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?
            .error_for_status()
            .with_context(|| format!("GET {}", self.url))?;
        response
            .json::<Vec<StatusSnapshot>>()
            .await
            .context("decoding status feed")
    }
}
