use super::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[test]
fn test_delay_grows_and_caps() {
    let config = RetryConfig {
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(350),
        ..Default::default()
    };

    assert_eq!(config.delay_after(1), Duration::from_millis(100));
    assert_eq!(config.delay_after(2), Duration::from_millis(200));
    assert_eq!(config.delay_after(3), Duration::from_millis(350));
}

#[test]
fn test_attempts_at_least_one() {
    assert_eq!(RetryConfig::default().with_max_attempts(0).max_attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_after_transient_failures() {
    let config = RetryConfig::default().with_max_attempts(3);
    let counter = Arc::new(AtomicU32::new(0));

    let result: Result<u32, RetryError<&str>> = retry_with_backoff(
        &config,
        || {
            let c = counter.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("token endpoint unavailable")
                } else {
                    Ok(7)
                }
            }
        },
        |_| true,
    )
    .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    let config = RetryConfig::default().with_max_attempts(2);
    let counter = Arc::new(AtomicU32::new(0));

    let result: Result<u32, RetryError<&str>> = retry_with_backoff(
        &config,
        || {
            let c = counter.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("invalid_client")
            }
        },
        |_| true,
    )
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.attempts, 2);
    assert_eq!(err.last_error, "invalid_client");
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_non_retryable_stops_immediately() {
    let config = RetryConfig::default().with_max_attempts(5);
    let counter = Arc::new(AtomicU32::new(0));

    let result: Result<u32, RetryError<&str>> = retry_with_backoff(
        &config,
        || {
            let c = counter.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err("unauthorized")
            }
        },
        |_| false,
    )
    .await;

    assert_eq!(result.unwrap_err().attempts, 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
