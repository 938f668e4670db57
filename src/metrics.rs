//! Prometheus metrics.
//!
//! Handlers record through the `metrics` facade; the recorder is installed
//! once per process and rendered by the `/metrics` route. Histogram samples
//! are only drained by upkeep, so a server must run [`spawn_upkeep`] whether
//! or not anything scrapes it.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How often [`spawn_upkeep`] drains recorded histogram samples.
pub const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder (first call only) and return its handle.
pub fn init() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if ::metrics::set_global_recorder(recorder).is_err() {
                warn!("A metrics recorder was already installed; /metrics will be empty");
            }
            handle
        })
        .clone()
}

/// Run `handle.run_upkeep()` every `period` until `shutdown` is cancelled.
pub fn spawn_upkeep(
    handle: PrometheusHandle,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => handle.run_upkeep(),
            }
        }
        debug!("Metrics upkeep stopped");
    })
}

/// Count a served request by endpoint and response status.
pub fn record_request(endpoint: &'static str, status: u16) {
    ::metrics::counter!(
        "hls_proxy_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record time spent handling a request since `start`.
pub fn record_duration(endpoint: &'static str, start: Instant) {
    ::metrics::histogram!("hls_proxy_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_origin_error() {
    ::metrics::counter!("hls_proxy_origin_errors_total").increment(1);
}
