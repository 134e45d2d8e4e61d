//! Extraction configuration constants

use std::time::Duration;

/// Maximum number of retries for 429 and 5xx responses.
/// 5 retries with base-2 backoff waits at most 2+4+8+16+32 = 62 seconds per call.
pub const MAX_RETRIES: u32 = 5;

/// Exponential backoff base in seconds (delay = base^retry).
pub const RETRY_BACKOFF_BASE: u64 = 2;

/// Requests per second sustained by the shared token bucket.
/// The provider allows 10 requests/second per API key; 9 keeps one in reserve.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 9.0;

/// Maximum number of requests in flight at any time.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// HTTP connect timeout (seconds) - time to establish TCP connection
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP request timeout (seconds) - overall time for one attempt
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default path of the consolidated output document
pub const DEFAULT_OUTPUT_PATH: &str = "consolidated_phone_data.json";

/// Default path of the failure report
pub const DEFAULT_FAILED_OUTPUT_PATH: &str = "failed_items.json";

/// Retry behaviour of the request executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Length of one backoff unit; the n-th retry waits `unit * base^n`
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the backoff unit
    pub fn with_backoff_unit(mut self, backoff_unit: Duration) -> Self {
        self.backoff_unit = backoff_unit;
        self
    }

    /// Backoff before the given retry (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        calculate_backoff(retry, self.backoff_unit)
    }
}

/// Calculate exponential backoff delay: `unit * RETRY_BACKOFF_BASE^retry`
pub fn calculate_backoff(retry: u32, unit: Duration) -> Duration {
    let factor = RETRY_BACKOFF_BASE.saturating_pow(retry);
    unit.saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX))
}
