//! # Retry policies
//!
//! A [`RetryPolicy`] is plain configuration: how many attempts a
//! message gets, how long to wait before each redelivery, and
//! (optionally) a last-word predicate on whether an error is worth
//! retrying at all.  It holds no state, so a single policy is shared
//! by every message a consumer handles, and its delays can be tested
//! on their own.

use std::sync::Arc;
use std::time::Duration;

type Predicate = Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

/// How the delay grows with the attempt number.
#[derive(Clone)]
#[non_exhaustive]
pub enum Backoff {
    /// The same delay for every attempt.
    Fixed(Duration),
    /// `base * attempt`, capped at `max`.
    Linear { base: Duration, max: Duration },
    /// `base * 2^(attempt - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Backoff {
    /// The delay before redelivering after the given attempt.
    ///
    /// Attempts are 1-based; `0` is treated as `1`.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);

        match self {
            Self::Fixed(delay) => *delay,
            Self::Linear { base, max } => base.saturating_mul(attempt).min(*max),
            Self::Exponential { base, max } => {
                let factor = 2u32.checked_pow(attempt - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(*max)
            }
            Self::Custom(f) => f(attempt),
        }
    }
}

impl std::fmt::Debug for Backoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            Self::Linear { base, max } => f
                .debug_struct("Linear")
                .field("base", base)
                .field("max", max)
                .finish(),
            Self::Exponential { base, max } => f
                .debug_struct("Exponential")
                .field("base", base)
                .field("max", max)
                .finish(),
            Self::Custom(_) => f.debug_tuple("Custom").finish_non_exhaustive(),
        }
    }
}

/// Retry configuration for a consumer.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    is_retryable: Option<Predicate>,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);

    #[must_use]
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
            is_retryable: None,
        }
    }

    #[must_use]
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(delay))
    }

    #[must_use]
    pub fn linear(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self::new(max_attempts, Backoff::Linear { base, max })
    }

    #[must_use]
    pub fn exponential(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self::new(max_attempts, Backoff::Exponential { base, max })
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self { Self::fixed(0, Duration::ZERO) }

    pub fn custom<F>(max_attempts: u32, delay: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::new(max_attempts, Backoff::Custom(Arc::new(delay)))
    }

    /// Adds a predicate that must also agree before an error is
    /// retried.
    ///
    /// This is only consulted after the default classifier has
    /// already decided to retry; a custom error handler on the
    /// consumer bypasses it.
    #[must_use]
    pub fn with_retryable<F>(self, predicate: F) -> Self
    where
        F: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        Self {
            is_retryable: Some(Arc::new(predicate)),
            ..self
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 { self.max_attempts }

    #[must_use]
    pub fn backoff(&self) -> &Backoff { &self.backoff }

    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration { self.backoff.delay(attempt) }

    /// Whether the predicate (if any) allows retrying this error.
    #[must_use]
    pub fn is_retryable(&self, error: &anyhow::Error) -> bool {
        self.is_retryable
            .as_ref()
            .map_or(true, |predicate| predicate(error))
    }

    #[must_use]
    pub fn has_retryable_predicate(&self) -> bool { self.is_retryable.is_some() }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(
            Self::DEFAULT_MAX_ATTEMPTS,
            Self::DEFAULT_BASE_DELAY,
            Self::DEFAULT_MAX_DELAY,
        )
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("is_retryable", &self.is_retryable.is_some())
            .finish()
    }
}

/// A declarative retry policy, for loading from configuration.
///
/// ```
/// use batchq::retry::{RetryPolicy, RetryStrategy};
///
/// let strategy: RetryStrategy = serde_json::from_str(
///     r#"{ "type": "linear", "max_attempts": 5, "base_delay_seconds": 10 }"#,
/// )
/// .unwrap();
/// let policy = RetryPolicy::from(strategy);
///
/// assert_eq!(policy.max_attempts(), 5);
/// assert_eq!(policy.delay(3).as_secs(), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum RetryStrategy {
    Fixed {
        max_attempts: u32,
        delay_seconds: u64,
    },
    Linear {
        max_attempts: u32,
        base_delay_seconds: u64,
        #[serde(default = "default_max_delay_seconds")]
        max_delay_seconds: u64,
    },
    Exponential {
        max_attempts: u32,
        base_delay_seconds: u64,
        #[serde(default = "default_max_delay_seconds")]
        max_delay_seconds: u64,
    },
    None,
}

fn default_max_delay_seconds() -> u64 { RetryPolicy::DEFAULT_MAX_DELAY.as_secs() }

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Exponential {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            base_delay_seconds: RetryPolicy::DEFAULT_BASE_DELAY.as_secs(),
            max_delay_seconds: default_max_delay_seconds(),
        }
    }
}

impl From<RetryStrategy> for RetryPolicy {
    fn from(strategy: RetryStrategy) -> Self {
        match strategy {
            RetryStrategy::Fixed {
                max_attempts,
                delay_seconds,
            } => Self::fixed(max_attempts, Duration::from_secs(delay_seconds)),
            RetryStrategy::Linear {
                max_attempts,
                base_delay_seconds,
                max_delay_seconds,
            } => Self::linear(
                max_attempts,
                Duration::from_secs(base_delay_seconds),
                Duration::from_secs(max_delay_seconds),
            ),
            RetryStrategy::Exponential {
                max_attempts,
                base_delay_seconds,
                max_delay_seconds,
            } => Self::exponential(
                max_attempts,
                Duration::from_secs(base_delay_seconds),
                Duration::from_secs(max_delay_seconds),
            ),
            RetryStrategy::None => Self::none(),
        }
    }
}
