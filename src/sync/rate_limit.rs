//! Token-bucket rate limiting for upstream requests.
//!
//! One shared bucket paces every outbound request for the whole process run.
//! The bucket refills continuously at a steady rate up to a burst capacity;
//! acquisition blocks until a token is available or shutdown is requested.
//! No retry or backoff logic lives here; failures pass through unchanged.

use crate::shutdown::ShutdownCoordinator;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Rate limiter errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Shutdown was requested while waiting for a token.
    #[error("rate limit wait interrupted by shutdown")]
    Cancelled,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Shared token bucket.
///
/// Safe for concurrent acquisition: the bucket state sits behind a mutex, so
/// a token can never be spent twice even if callers are parallelized later.
/// Waiters are not FIFO; fairness is not guaranteed and not required.
pub struct RateLimiter {
    rate_per_sec: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Create a limiter refilling at `rate_per_sec` tokens per second with
    /// the given burst capacity. The bucket starts full.
    ///
    /// # Panics
    /// Panics if `rate_per_sec` is not strictly positive or `burst` is zero.
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        assert!(rate_per_sec > 0.0, "rate must be positive");
        assert!(burst > 0, "burst must be at least 1");
        Self {
            rate_per_sec,
            burst: f64::from(burst),
            state: Mutex::new(BucketState {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Create a limiter expressed as requests per hour.
    pub fn per_hour(requests_per_hour: u32, burst: u32) -> Self {
        Self::new(f64::from(requests_per_hour) / 3600.0, burst)
    }

    /// Take one token, waiting for the bucket to refill if necessary.
    ///
    /// Returns [`RateLimitError::Cancelled`] if shutdown is requested while
    /// waiting; the token is not spent in that case.
    pub async fn acquire(&self, shutdown: &ShutdownCoordinator) -> Result<(), RateLimitError> {
        loop {
            if shutdown.is_shutdown_requested() {
                return Err(RateLimitError::Cancelled);
            }

            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate_per_sec)
            };

            tokio::select! {
                _ = sleep(wait) => {}
                _ = shutdown.wait_for_shutdown() => return Err(RateLimitError::Cancelled),
            }
        }
    }
}
