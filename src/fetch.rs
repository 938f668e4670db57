//! Origin manifest fetching.
//!
//! [`ManifestSource`] is the seam between the rewriting core and the
//! network. [`HttpManifestSource`] is the production implementation: one
//! GET per call, no retry, bounded by an absolute timeout that also covers
//! reading the body. Dropping the returned future aborts the request, so a
//! client disconnect cancels the origin fetch with it.

use crate::error::Result;
use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::Duration;
use tracing::{info, warn};

/// Default absolute timeout for an origin manifest fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can fetch a manifest body as text.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// GET `url` and return the full body.
    ///
    /// # Errors
    /// [`crate::error::ProxyError::FetchError`] on network failure, timeout
    /// or a non-2xx status. No partial body is ever returned.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// [`ManifestSource`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpManifestSource {
    client: Client,
    timeout: Duration,
}

impl HttpManifestSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header(header::CACHE_CONTROL, "no-cache, no-store")
            .header(header::PRAGMA, "no-cache")
            .send()
            .await
            .inspect_err(|e| warn!("HTTP fetch failed for {}: {}", url, e))?;

        info!(
            "HTTP fetch of {} completed with status {}",
            url,
            response.status()
        );

        if !response.status().is_success() {
            warn!("HTTP fetch returned {} for {}", response.status(), url);
        }

        let body = response
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| warn!("Failed to read body from {}: {}", url, e))?;

        Ok(body)
    }
}
