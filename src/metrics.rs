//! Prometheus metrics for OpenPhone API traffic
//!
//! Everything goes through the `metrics` facade. Until [`init_metrics`] installs
//! the Prometheus recorder every call here is a no-op, so library users that
//! never pass `--metrics-addr` pay nothing.
//!
//! Exported series:
//!
//! | name | kind | labels |
//! |---|---|---|
//! | `openphone_requests_total` | counter | `endpoint`, `status` |
//! | `openphone_rate_limited_total` | counter | `endpoint` |
//! | `openphone_retries_total` | counter | `reason` |
//! | `openphone_request_duration_seconds` | histogram | `endpoint` |
//! | `openphone_retry_backoff_seconds` | histogram | |
//! | `openphone_rate_limit_wait_seconds` | histogram | |
//! | `openphone_fetch_failures_total` | counter | `category` |

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

const REQUESTS_TOTAL: &str = "openphone_requests_total";
const RATE_LIMITED_TOTAL: &str = "openphone_rate_limited_total";
const RETRIES_TOTAL: &str = "openphone_retries_total";
const REQUEST_DURATION: &str = "openphone_request_duration_seconds";
const RETRY_BACKOFF: &str = "openphone_retry_backoff_seconds";
const RATE_LIMIT_WAIT: &str = "openphone_rate_limit_wait_seconds";
const FETCH_FAILURES_TOTAL: &str = "openphone_fetch_failures_total";

const COUNTERS: [(&str, &str); 4] = [
    (REQUESTS_TOTAL, "Responses and transport failures, by endpoint and status"),
    (RATE_LIMITED_TOTAL, "429 responses, by endpoint"),
    (RETRIES_TOTAL, "Retries scheduled after 429 or 5xx responses"),
    (FETCH_FAILURES_TOTAL, "Entries added to the failure report, by category"),
];

const HISTOGRAMS: [(&str, &str); 3] = [
    (REQUEST_DURATION, "Duration of one HTTP attempt"),
    (RETRY_BACKOFF, "Backoff slept before a retry"),
    (RATE_LIMIT_WAIT, "Time spent waiting for a token bucket token"),
];

/// Address the exporter was installed on
static EXPORTER_ADDR: OnceCell<SocketAddr> = OnceCell::new();

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(0);

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The Prometheus exporter could not be installed
    #[error("failed to install Prometheus exporter on {addr}: {source}")]
    Install {
        /// Requested listen address
        addr: SocketAddr,
        /// Exporter error
        #[source]
        source: BuildError,
    },
}

/// Install the Prometheus exporter and describe every series.
///
/// Only the first successful call installs anything; later calls return `Ok`.
/// Must run inside a Tokio runtime (the scrape listener is spawned on it).
pub fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    if let Some(existing) = EXPORTER_ADDR.get() {
        debug!("Metrics exporter already running on {}", existing);
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|source| MetricsError::Install { addr, source })?;
    // a failed install leaves the cell empty so a later call can retry
    let _ = EXPORTER_ADDR.set(addr);

    for (name, description) in COUNTERS {
        describe_counter!(name, Unit::Count, description);
    }
    for (name, description) in HISTOGRAMS {
        describe_histogram!(name, Unit::Seconds, description);
    }

    info!("Serving Prometheus metrics on http://{}/metrics", addr);
    Ok(())
}

/// Short id tying the log lines of one attempt together
pub fn next_request_id() -> String {
    let seq = REQUEST_SEQ.fetch_add(1, Ordering::Relaxed) + 1;
    format!("op-{seq:06}")
}

/// Times one HTTP attempt against an endpoint
#[derive(Debug)]
pub struct RequestTimer {
    endpoint: String,
    attempt: u32,
    request_id: String,
    started: Instant,
}

impl RequestTimer {
    /// Start timing; `attempt` is 0 for the first try
    pub fn start(endpoint: impl Into<String>, attempt: u32) -> Self {
        let timer = Self {
            endpoint: endpoint.into(),
            attempt,
            request_id: next_request_id(),
            started: Instant::now(),
        };
        trace!(
            request_id = %timer.request_id,
            endpoint = %timer.endpoint,
            attempt,
            "Sending request"
        );
        timer
    }

    /// Id used in this attempt's log lines
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// A response arrived with `status`
    pub fn finish(&self, status: u16) {
        let elapsed = self.observe(status.to_string());
        if status == 429 {
            counter!(RATE_LIMITED_TOTAL, "endpoint" => self.endpoint.clone()).increment(1);
        }
        debug!(
            request_id = %self.request_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Response received"
        );
    }

    /// The attempt failed before any response
    pub fn network_error(&self) {
        let elapsed = self.observe("network_error".to_string());
        debug!(
            request_id = %self.request_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request failed without response"
        );
    }

    fn observe(&self, status: String) -> Duration {
        let elapsed = self.started.elapsed();
        counter!(REQUESTS_TOTAL, "endpoint" => self.endpoint.clone(), "status" => status)
            .increment(1);
        histogram!(REQUEST_DURATION, "endpoint" => self.endpoint.clone())
            .record(elapsed.as_secs_f64());
        elapsed
    }
}

/// A retry was scheduled after `backoff`
pub fn record_retry(reason: &'static str, backoff: Duration) {
    counter!(RETRIES_TOTAL, "reason" => reason).increment(1);
    histogram!(RETRY_BACKOFF).record(backoff.as_secs_f64());
}

/// Time spent waiting on the token bucket
pub fn record_rate_limit_wait(waited: Duration) {
    histogram!(RATE_LIMIT_WAIT).record(waited.as_secs_f64());
}

/// One entry added to the failure report
pub fn record_fetch_failure(category: &'static str) {
    counter!(FETCH_FAILURES_TOTAL, "category" => category).increment(1);
}
