// ABOUTME: Tests for the sliding-window rate limiter.
// ABOUTME: Uses paused tokio time to step through window expiry precisely.

use std::sync::Arc;
use std::time::Duration;

use super::rate_limiter::RateLimiter;

#[tokio::test(start_paused = true)]
async fn test_new_limiter_permits() {
    let limiter = RateLimiter::new(2, 10);
    assert!(limiter.permitted().await);
    assert_eq!(limiter.wait_time().await, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_minute_cap_blocks_until_expiry() {
    let limiter = RateLimiter::new(2, 100);

    limiter.record().await;
    limiter.record().await;
    assert!(!limiter.permitted().await);

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(!limiter.permitted().await);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(limiter.permitted().await);
}

#[tokio::test(start_paused = true)]
async fn test_wait_time_counts_down_from_oldest_entry() {
    let limiter = RateLimiter::new(1, 100);
    limiter.record().await;

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(limiter.wait_time().await, Duration::from_secs(50));
}

#[tokio::test(start_paused = true)]
async fn test_wait_time_takes_longer_window_when_both_full() {
    let limiter = RateLimiter::new(1, 1);
    limiter.record().await;

    tokio::time::advance(Duration::from_secs(30)).await;
    // Minute window needs 30s more, hour window needs 3570s more.
    assert_eq!(limiter.wait_time().await, Duration::from_secs(3570));

    tokio::time::advance(Duration::from_secs(40)).await;
    // Minute window has emptied; only the hour window is still full.
    assert_eq!(limiter.wait_time().await, Duration::from_secs(3530));
    assert!(!limiter.permitted().await);
}

#[tokio::test(start_paused = true)]
async fn test_hour_cap_applies_independently() {
    let limiter = RateLimiter::new(100, 3);

    for _ in 0..3 {
        assert!(limiter.try_acquire().await);
        tokio::time::advance(Duration::from_secs(61)).await;
    }

    // Minute window is empty, but three requests happened within the hour.
    let usage = limiter.usage().await;
    assert_eq!(usage.minute_count, 0);
    assert_eq!(usage.hour_count, 3);
    assert!(!limiter.permitted().await);
}

#[tokio::test(start_paused = true)]
async fn test_pruning_is_idempotent() {
    let limiter = RateLimiter::new(5, 5);
    limiter.record().await;
    limiter.record().await;

    let first = limiter.usage().await;
    let second = limiter.usage().await;
    assert!(limiter.permitted().await);
    let third = limiter.usage().await;

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(third.minute_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_try_acquire_never_exceeds_caps() {
    let limiter = RateLimiter::new(3, 5);

    let mut admitted = 0;
    for _ in 0..10 {
        if limiter.try_acquire().await {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 3);

    tokio::time::advance(Duration::from_secs(60)).await;
    let mut admitted = 0;
    for _ in 0..10 {
        if limiter.try_acquire().await {
            admitted += 1;
        }
    }
    // Hour cap of 5 leaves room for only 2 more.
    assert_eq!(admitted, 2);

    let usage = limiter.usage().await;
    assert!(usage.minute_count <= 3);
    assert!(usage.hour_count <= 5);
}

#[tokio::test(start_paused = true)]
async fn test_permitted_record_sequence_respects_caps() {
    let limiter = RateLimiter::new(4, 6);

    for step in 0..50 {
        if limiter.permitted().await {
            limiter.record().await;
        }
        let usage = limiter.usage().await;
        assert!(usage.minute_count <= 4, "step {}: {:?}", step, usage);
        assert!(usage.hour_count <= 6, "step {}: {:?}", step, usage);
        tokio::time::advance(Duration::from_secs(7)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_caps_are_raised_to_one() {
    let limiter = RateLimiter::new(0, 0);
    assert_eq!(limiter.per_minute(), 1);
    assert_eq!(limiter.per_hour(), 1);
    assert!(limiter.try_acquire().await);
    assert!(!limiter.try_acquire().await);
}

#[tokio::test]
async fn test_concurrent_acquires_admit_exactly_cap() {
    let limiter = Arc::new(RateLimiter::new(5, 100));
    let mut handles = Vec::new();

    for _ in 0..20 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move { limiter.try_acquire().await }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 5, "Exactly cap requests should be admitted");
}
