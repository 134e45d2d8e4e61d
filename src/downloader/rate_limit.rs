//! Token-bucket rate limiting
//!
//! One [`RateLimiter`] is shared (via `Arc`) by every concurrent request issuer,
//! so the provider's per-key ceiling holds no matter how wide the fan-out gets.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// Longest single sleep while waiting for a token; the bucket is rechecked after it
const MAX_REFILL_WAIT: Duration = Duration::from_secs(60);

/// Token-bucket rate limiter
///
/// The bucket starts full. Refill is computed lazily on each acquisition attempt
/// as `elapsed * rate`, capped at `burst`.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a limiter allowing `rate` requests per second with one second of burst.
    ///
    /// # Arguments
    /// * `rate` - Tokens added per second (must be positive)
    pub fn new(rate: f64) -> Self {
        Self::with_burst(rate, rate.floor().max(1.0) as u32)
    }

    /// Create a limiter with an explicit bucket capacity.
    ///
    /// # Arguments
    /// * `rate` - Tokens added per second (must be positive)
    /// * `burst` - Maximum tokens held by the bucket
    pub fn with_burst(rate: f64, burst: u32) -> Self {
        let rate = if rate.is_finite() && rate > 0.0 { rate } else { 1.0 };
        let burst = f64::from(burst.max(1));
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Tokens added per second
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity
    pub fn burst(&self) -> u32 {
        self.burst as u32
    }

    /// Wait until a token is available, then consume it.
    ///
    /// The lock is released while sleeping so other acquirers can refill and
    /// compete; no fairness between waiters is promised.
    pub async fn acquire(&self) {
        let started = Instant::now();
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    let waited = started.elapsed();
                    if !waited.is_zero() {
                        trace!(waited_ms = waited.as_millis() as u64, "Rate limit token acquired");
                    }
                    crate::metrics::record_rate_limit_wait(waited);
                    return;
                }

                Duration::try_from_secs_f64((1.0 - state.tokens) / self.rate)
                    .map_or(MAX_REFILL_WAIT, |wait| wait.min(MAX_REFILL_WAIT))
            };

            sleep(wait).await;
        }
    }
}
