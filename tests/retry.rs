use batchq::retry::{Backoff, RetryPolicy, RetryStrategy};
use batchq::{FatalError, RetryableError};
use std::time::Duration;

fn secs(n: u64) -> Duration { Duration::from_secs(n) }

#[test]
fn test_default_policy() {
    let policy = RetryPolicy::default();

    assert_eq!(policy.max_attempts(), 3);
    assert_eq!(policy.delay(1), secs(2));
    assert_eq!(policy.delay(2), secs(4));
    assert_eq!(policy.delay(3), secs(8));
    assert!(!policy.has_retryable_predicate());
}

#[test]
fn test_fixed_delay() {
    let policy = RetryPolicy::fixed(5, secs(7));

    assert_eq!(policy.max_attempts(), 5);
    assert!((1..=10).all(|attempt| policy.delay(attempt) == secs(7)));
}

#[test]
fn test_linear_backoff_is_capped() {
    let policy = RetryPolicy::linear(10, secs(5), secs(12));

    assert_eq!(policy.delay(1), secs(5));
    assert_eq!(policy.delay(2), secs(10));
    assert_eq!(policy.delay(3), secs(12));
    assert_eq!(policy.delay(50), secs(12));
}

#[test]
fn test_exponential_backoff_is_capped() {
    let policy = RetryPolicy::exponential(10, secs(1), secs(60));

    let delays = (1..=8).map(|attempt| policy.delay(attempt).as_secs()).collect::<Vec<_>>();
    assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);

    // far past the point where 2^n overflows.
    assert_eq!(policy.delay(u32::MAX), secs(60));
}

#[test]
fn test_attempt_zero_is_treated_as_first() {
    assert_eq!(RetryPolicy::exponential(3, secs(3), secs(100)).delay(0), secs(3));
    assert_eq!(RetryPolicy::linear(3, secs(3), secs(100)).delay(0), secs(3));
}

#[test]
fn test_no_retry_policy() {
    let policy = RetryPolicy::none();

    assert_eq!(policy.max_attempts(), 0);
    assert_eq!(policy.delay(1), Duration::ZERO);
}

#[test]
fn test_custom_delay() {
    let policy = RetryPolicy::custom(4, |attempt| Duration::from_millis(u64::from(attempt) * 250));

    assert_eq!(policy.delay(2), Duration::from_millis(500));
    assert!(matches!(policy.backoff(), Backoff::Custom(_)));
}

#[test]
fn test_delay_is_deterministic() {
    let policy = RetryPolicy::default();
    let first = (1..=5).map(|attempt| policy.delay(attempt)).collect::<Vec<_>>();
    let second = (1..=5).map(|attempt| policy.delay(attempt)).collect::<Vec<_>>();

    assert_eq!(first, second);
}

#[test]
fn test_retryable_predicate() {
    let policy =
        RetryPolicy::default().with_retryable(|error| !error.to_string().contains("quota"));

    assert!(policy.has_retryable_predicate());
    assert!(policy.is_retryable(&anyhow::Error::new(RetryableError::new("busy"))));
    assert!(!policy.is_retryable(&anyhow::Error::new(FatalError::new("quota exceeded"))));
    assert!(RetryPolicy::default().is_retryable(&anyhow::anyhow!("anything")));
}

#[test]
fn test_strategy_from_config() {
    let strategy: RetryStrategy = serde_json::from_value(serde_json::json!({
        "type": "exponential",
        "max_attempts": 6,
        "base_delay_seconds": 3,
        "max_delay_seconds": 20
    }))
    .expect("deserialize");
    let policy = RetryPolicy::from(strategy);

    assert_eq!(policy.max_attempts(), 6);
    assert_eq!(policy.delay(1), secs(3));
    assert_eq!(policy.delay(4), secs(20));

    let strategy: RetryStrategy =
        serde_json::from_str(r#"{ "type": "none" }"#).expect("deserialize");
    assert_eq!(RetryPolicy::from(strategy).max_attempts(), 0);

    let strategy: RetryStrategy =
        serde_json::from_str(r#"{ "type": "fixed", "max_attempts": 2, "delay_seconds": 9 }"#)
            .expect("deserialize");
    assert_eq!(RetryPolicy::from(strategy).delay(2), secs(9));
}

#[test]
fn test_default_strategy_matches_default_policy() {
    let from_strategy = RetryPolicy::from(RetryStrategy::default());
    let default = RetryPolicy::default();

    assert_eq!(from_strategy.max_attempts(), default.max_attempts());
    assert!((1..=12).all(|attempt| from_strategy.delay(attempt) == default.delay(attempt)));
}
