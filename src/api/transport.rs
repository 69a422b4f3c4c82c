//! Rate-limited HTTP transport.
//!
//! Every outbound request, token refreshes included, first takes one token
//! from the shared bucket. The transport never retries and never inspects
//! response bodies; those concerns belong to the client layer.

use crate::api::{ApiError, ApiResult};
use crate::shutdown::SharedShutdown;
use crate::sync::rate_limit::RateLimiter;
use std::sync::Arc;
use tracing::debug;

/// HTTP transport that paces requests through a shared token bucket.
pub struct ThrottledTransport {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    shutdown: SharedShutdown,
}

impl ThrottledTransport {
    /// Create a transport over the given client, bucket, and shutdown handle.
    pub fn new(http: reqwest::Client, limiter: Arc<RateLimiter>, shutdown: SharedShutdown) -> Self {
        Self {
            http,
            limiter,
            shutdown,
        }
    }

    /// The underlying HTTP client, for building requests.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Acquire one rate-limit token, then send the request.
    ///
    /// Cancellation during the wait or while the request is in flight
    /// surfaces as [`ApiError::Cancelled`]; no request is sent if the wait
    /// was interrupted.
    pub async fn execute(&self, request: reqwest::RequestBuilder) -> ApiResult<reqwest::Response> {
        self.limiter.acquire(&self.shutdown).await?;
        debug!("rate limit token acquired, sending request");

        tokio::select! {
            result = request.send() => {
                result.map_err(|e| ApiError::Network(e.to_string()))
            }
            _ = self.shutdown.wait_for_shutdown() => Err(ApiError::Cancelled),
        }
    }
}
