//! Sync engine configuration constants.

use std::time::Duration;

/// Default steady request rate against the upstream API.
/// The documented ceiling is 500 requests per hour per user; 300 leaves
/// headroom for other consumers of the same account.
pub const DEFAULT_REQUESTS_PER_HOUR: u32 = 300;

/// Default burst capacity of the request bucket.
/// Matches the upstream short-window allowance of 50 requests per 10 seconds.
pub const DEFAULT_BURST: u32 = 50;

/// Default window searched for the last written sample in incremental mode.
/// 90 days covers any realistic gap between runs of a periodic job.
pub const DEFAULT_INCREMENTAL_LOOKBACK: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Access tokens are refreshed this long before their reported expiry, so a
/// token cannot lapse mid-request.
pub const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(60);
