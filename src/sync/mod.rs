//! The sync engine.
//!
//! # Overview
//!
//! One run proceeds in three layers:
//!
//! 1. **Rate limiting**: every upstream request takes a token from one
//!    shared bucket ([`rate_limit::RateLimiter`])
//! 2. **Resume decision**: each unit's starting timestamp comes from the
//!    resume token, the sink's last written sample, or a lookback window
//!    ([`resume::ResumeCoordinator`])
//! 3. **Session**: units are synced strictly one at a time, page by page,
//!    failing fast on the first error ([`session::SyncSession`])
//!
//! There is no retry anywhere in the engine: a periodic scheduler re-runs
//! the whole process, and the resume machinery makes the re-run cheap.

use crate::api::ApiError;
use crate::sink::SinkError;

pub mod config;
pub mod rate_limit;
pub mod resume;
pub mod session;

pub use rate_limit::{RateLimitError, RateLimiter};
pub use resume::{ResumeCoordinator, ResumeToken, StartDecision, TokenParseError};
pub use session::{units_for_stations, SyncOptions, SyncSession, SyncStats, SyncUnit};

/// Sync errors
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Upstream fetch failed.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The sink rejected an append or a probe.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
}
