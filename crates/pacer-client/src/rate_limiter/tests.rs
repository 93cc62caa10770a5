use super::*;

fn spacing_only(interval_ms: u64) -> RateLimiterConfig {
    RateLimiterConfig::default()
        .with_request_interval(Duration::from_millis(interval_ms))
        .with_threshold(0, Duration::ZERO)
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_acquisitions_are_spaced() {
    let limiter = RateLimiter::new(spacing_only(500));

    limiter.acquire().await;
    let first = Instant::now();
    limiter.acquire().await;
    let second = Instant::now();

    assert!(second - first >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_are_serialized() {
    let limiter = Arc::new(RateLimiter::new(spacing_only(500)));
    let completions = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let limiter = limiter.clone();
            let completions = completions.clone();
            tokio::spawn(async move {
                limiter.acquire().await;
                completions.lock().await.push(Instant::now());
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let mut times = completions.lock().await.clone();
    times.sort();
    assert_eq!(times.len(), 5);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(500));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_after_threshold() {
    let config = RateLimiterConfig::default()
        .with_request_interval(Duration::ZERO)
        .with_threshold(3, Duration::from_secs(10));
    let limiter = RateLimiter::new(config);

    let start = Instant::now();
    for _ in 0..3 {
        limiter.acquire().await;
    }
    let after_threshold = Instant::now();
    assert!(after_threshold - start < Duration::from_millis(1));
    assert_eq!(limiter.request_count().await, 3);

    limiter.acquire().await;
    assert!(Instant::now() - after_threshold >= Duration::from_secs(10));
    assert_eq!(limiter.request_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_disabled_never_waits() {
    let limiter = RateLimiter::new(RateLimiterConfig::disabled());
    let start = Instant::now();
    for _ in 0..50 {
        limiter.acquire().await;
    }
    assert_eq!(Instant::now(), start);
    assert_eq!(limiter.request_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_configure_applies_to_next_acquire() {
    let limiter = RateLimiter::new(spacing_only(5_000));
    limiter.acquire().await;

    limiter.configure(RateLimiterConfig::disabled());
    let start = Instant::now();
    limiter.acquire().await;
    assert_eq!(Instant::now(), start);
    assert!(!limiter.config().enabled);
}

#[test]
fn test_config_defaults_from_empty_document() {
    let config: RateLimiterConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, RateLimiterConfig::default());
    assert_eq!(config.request_interval_ms, 500);
    assert_eq!(config.rate_limit_retry_delay(), Duration::from_secs(30));
}
