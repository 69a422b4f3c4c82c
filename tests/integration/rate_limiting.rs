//! Integration tests for rate limiting behavior
//!
//! Timing properties are verified against tokio's paused test clock, so the
//! tests are exact and take no wall-clock time.

use netatmo_sync::shutdown::ShutdownCoordinator;
use netatmo_sync::sync::{RateLimitError, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn burst_capacity_is_available_immediately() {
    let limiter = RateLimiter::new(2.0, 5);
    let shutdown = ShutdownCoordinator::new();

    let before = Instant::now();
    for _ in 0..5 {
        limiter.acquire(&shutdown).await.unwrap();
    }
    assert_eq!(before.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn request_past_burst_blocks_for_at_least_one_refill() {
    // Bucket of burst B = 3 at rate R = 1/s: the (B+1)-th acquisition
    // issued back to back must block for at least 1/R seconds.
    let limiter = RateLimiter::new(1.0, 3);
    let shutdown = ShutdownCoordinator::new();

    for _ in 0..3 {
        limiter.acquire(&shutdown).await.unwrap();
    }

    let before = Instant::now();
    limiter.acquire(&shutdown).await.unwrap();
    assert!(before.elapsed() >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn hourly_rate_spaces_requests_evenly() {
    // 3600 per hour is one per second; draining burst then taking two more
    // tokens costs two refill intervals.
    let limiter = RateLimiter::per_hour(3600, 1);
    let shutdown = ShutdownCoordinator::new();

    limiter.acquire(&shutdown).await.unwrap();

    let before = Instant::now();
    limiter.acquire(&shutdown).await.unwrap();
    limiter.acquire(&shutdown).await.unwrap();
    assert!(before.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn shutdown_aborts_a_blocked_acquisition() {
    let limiter = Arc::new(RateLimiter::per_hour(1, 1));
    let shutdown = ShutdownCoordinator::shared();

    limiter.acquire(&shutdown).await.unwrap();

    let waiter = {
        let limiter = limiter.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { limiter.acquire(&shutdown).await })
    };
    tokio::task::yield_now().await;
    shutdown.request_shutdown();

    assert!(matches!(
        waiter.await.unwrap(),
        Err(RateLimitError::Cancelled)
    ));
}
