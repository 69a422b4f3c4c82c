//! Upstream API access.
//!
//! Everything that talks to the measurement service lives here: the
//! rate-limited transport, OAuth credential handling, the wire protocol
//! types, the station client, and the paginated measure fetch.

use crate::sync::rate_limit::RateLimitError;

pub mod auth;
pub mod client;
pub mod pagination;
pub mod protocol;
pub mod transport;

pub use client::StationClient;
pub use pagination::{MeasurePage, MeasurePager, MeasureQuery, MeasureSource};
pub use transport::ThrottledTransport;

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Shutdown was requested during a rate-limit wait or an in-flight
    /// request.
    #[error("request cancelled by shutdown")]
    Cancelled,

    /// Network-level failure (DNS, connect, timeout, broken transfer).
    #[error("network error: {0}")]
    Network(String),

    /// Non-200 HTTP response; the full body is kept for diagnostics.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The response envelope carried an `error` object, even under HTTP 200.
    #[error("upstream error {code}: {message}")]
    Upstream {
        /// Upstream error code.
        code: i64,
        /// Upstream error message.
        message: String,
    },

    /// The payload did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Credential acquisition or refresh failed.
    #[error("auth error: {0}")]
    Auth(String),

    /// The pagination safety valve tripped.
    #[error("fetched {0} pages without reaching an empty page")]
    PageLimit(usize),
}

impl From<RateLimitError> for ApiError {
    fn from(_: RateLimitError) -> Self {
        ApiError::Cancelled
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
