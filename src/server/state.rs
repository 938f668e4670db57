use crate::{
    config::Config,
    error::{ProxyError, Result},
    fetch::{HttpManifestSource, ManifestSource},
    metrics,
};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Where origin manifests are fetched from
    pub manifest_source: Arc<dyn ManifestSource>,
    /// Renders the process-wide Prometheus registry
    pub metrics: PrometheusHandle,
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState fetching origin manifests over HTTP
    pub fn new(config: Config) -> Result<Self> {
        // Pooled client shared by every request
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ProxyError::InternalError(format!("Failed to create HTTP client: {e}")))?;

        let source = HttpManifestSource::new(http_client, config.fetch_timeout());
        Ok(Self::with_source(config, Arc::new(source)))
    }

    /// Create an AppState around an existing [`ManifestSource`]
    pub fn with_source(config: Config, manifest_source: Arc<dyn ManifestSource>) -> Self {
        Self {
            config: Arc::new(config),
            manifest_source,
            metrics: metrics::init(),
            started_at: Instant::now(),
        }
    }
}
