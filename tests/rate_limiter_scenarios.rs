use gemini_bridge::{RateLimitConfig, RateLimiter};

fn config(per_minute: u32) -> RateLimitConfig {
    RateLimitConfig {
        enabled: true,
        per_minute,
        per_day: 10_000,
        burst: None,
    }
}

/// S6 — rate-limit refill: start full, drain the bucket, then advance the
/// clock (via a real sleep) and observe partial refill.
#[tokio::test]
async fn refill_after_draining_bucket() {
    let limiter = RateLimiter::new(&config(60));

    for _ in 0..60 {
        assert!(limiter.consume().await.is_ok());
    }
    assert!(!limiter.can_consume().await);

    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;
    assert!(limiter.can_consume().await);

    let status = limiter.get_quota_status().await;
    assert!(status.per_minute.used < 60);
}

#[tokio::test]
async fn wait_for_quota_returns_once_tokens_available() {
    let limiter = RateLimiter::new(&config(60));
    for _ in 0..60 {
        let _ = limiter.consume().await;
    }

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    tokio::time::timeout(std::time::Duration::from_secs(5), limiter.wait_for_quota())
        .await
        .expect("wait_for_quota should not block once quota is available");
}

#[tokio::test]
async fn consume_without_available_tokens_reports_retry_after() {
    let limiter = RateLimiter::new(&config(1));
    assert!(limiter.consume().await.is_ok());

    let err = limiter.consume().await.expect_err("bucket should be empty");
    assert!(err.retry_after.as_millis() > 0);
}

#[tokio::test]
async fn disabled_limiter_never_blocks() {
    let mut cfg = config(1);
    cfg.enabled = false;
    let limiter = RateLimiter::new(&cfg);

    for _ in 0..100 {
        assert!(limiter.consume().await.is_ok());
    }
}
