//! # Error taxonomy
//!
//! Every failure the consumer sees falls into one of four buckets:
//!
//! 1. a [`ValidationError`], where the body did not match the schema.
//!    Redelivering the same bytes will never fix this, so these are
//!    always terminal;
//! 2. a [`RetryableError`], which the handler raises to say "try
//!    again", optionally with a delay of its own;
//! 3. a [`FatalError`], which the handler raises to say "don't
//!    bother";
//! 4. anything else.
//!
//! The last bucket is the interesting one.  [`classify`] looks at the
//! error (and everything in its source chain) for signs of a
//! transient failure - timeouts, refused connections, DNS failures,
//! rate limits, unavailable services - and retries those.  Everything
//! it doesn't recognize is treated as fatal; an unknown error is far
//! more likely to be a bug than a blip, and retrying a bug just burns
//! through attempts.
//!
//! The taxonomy types are plain [`std::error::Error`]s, so handlers
//! can return them through [`anyhow`], wrap them with context, or
//! nest them as a source of their own error types; they're found
//! wherever they sit in the chain.

use crate::schema::{Issue, SchemaError};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationTarget {
    /// The body of a delivered message.
    Message { id: String },
    /// A single payload passed to the producer.
    Payload,
    /// One payload of a producer batch.
    BatchItem { index: usize },
}

impl std::fmt::Display for ValidationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message { id } => write!(f, "message {id}"),
            Self::Payload => f.write_str("payload"),
            Self::BatchItem { index } => write!(f, "batch payload at index {index}"),
        }
    }
}

/// A value did not conform to its schema.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{target} failed validation: {source}")]
pub struct ValidationError {
    target: ValidationTarget,
    #[source]
    source: SchemaError,
}

impl ValidationError {
    #[must_use]
    pub fn new(target: ValidationTarget, source: SchemaError) -> Self { Self { target, source } }

    #[must_use]
    pub fn target(&self) -> &ValidationTarget { &self.target }

    /// The index of the failing payload, if this came from a batch
    /// send.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self.target {
            ValidationTarget::BatchItem { index } => Some(index),
            _ => None,
        }
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] { self.source.issues() }
}

/// A failure that is worth retrying.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RetryableError {
    message: String,
    delay: Option<Duration>,
    #[source]
    source: Option<BoxError>,
}

impl RetryableError {
    pub fn new<M: Into<String>>(message: M) -> Self {
        Self {
            message: message.into(),
            delay: None,
            source: None,
        }
    }

    /// Overrides the retry policy's delay for this failure.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    #[must_use]
    pub fn with_source<E>(self, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            source: Some(source.into()),
            ..self
        }
    }

    #[must_use]
    pub fn delay(&self) -> Option<Duration> { self.delay }
}

/// A failure that will not succeed on redelivery.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct FatalError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl FatalError {
    pub fn new<M: Into<String>>(message: M) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source<E>(self, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self {
            source: Some(source.into()),
            ..self
        }
    }
}

/// What to do with a message whose handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorClassification {
    /// Hand the message back to the transport for redelivery.
    Retry,
    /// Acknowledge the message; it won't be redelivered.
    Acknowledge,
    /// Acknowledge the message, reporting it as a hard failure.
    Fatal,
}

impl ErrorClassification {
    #[must_use]
    pub fn is_retry(self) -> bool { matches!(self, Self::Retry) }
}

// Matched case-insensitively against every message in the chain.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "timeout",
    "timed out",
    "econnrefused",
    "econnreset",
    "enotfound",
    "connection refused",
    "connection reset",
    "network",
    "dns",
    "rate limit",
    "too many requests",
    "429",
    "service unavailable",
    "503",
];

/// The default classifier.
///
/// Only ever returns [`ErrorClassification::Retry`] or
/// [`ErrorClassification::Fatal`]; see the [module-level
/// documentation](self) for the rules.
#[must_use]
pub fn classify(error: &anyhow::Error) -> ErrorClassification {
    for cause in error.chain() {
        if cause.is::<RetryableError>() {
            return ErrorClassification::Retry;
        }

        if cause.is::<FatalError>() || cause.is::<ValidationError>() {
            return ErrorClassification::Fatal;
        }
    }

    if error.chain().any(is_transient) {
        ErrorClassification::Retry
    } else {
        ErrorClassification::Fatal
    }
}

/// The delay explicitly requested by a [`RetryableError`] in the
/// chain, if there is one.
#[must_use]
pub fn extract_delay(error: &anyhow::Error) -> Option<Duration> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<RetryableError>())
        .and_then(RetryableError::delay)
}

fn is_transient(cause: &(dyn std::error::Error + 'static)) -> bool {
    if cause.is::<tokio::time::error::Elapsed>() {
        return true;
    }

    if let Some(io) = cause.downcast_ref::<std::io::Error>() {
        use std::io::ErrorKind;

        if matches!(
            io.kind(),
            ErrorKind::TimedOut
                | ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
        ) {
            return true;
        }
    }

    let message = cause.to_string().to_ascii_lowercase();
    TRANSIENT_SIGNATURES
        .iter()
        .any(|signature| message.contains(signature))
}
