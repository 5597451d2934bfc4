//! # Schemas
//!
//! A schema is anything that can turn an untyped JSON value into a
//! typed value, or explain why it can't.  Both sides of the queue use
//! the same contract: the consumer parses every delivered body
//! through it before the handler ever sees the message, and the
//! producer runs every outgoing payload through it before anything
//! is handed to the transport.
//!
//! Most of the time you'll want [`SerdeSchema`], which uses the
//! type's own [`serde::Deserialize`] implementation; if you need
//! extra checks that serde can't express, wrap a closure with
//! [`schema_fn`].

use std::marker::PhantomData;
use std::sync::Arc;

/// Parses untyped input into a `T`.
pub trait Schema<T>: Send + Sync {
    /// Parses the given value.
    ///
    /// On failure, the returned [`SchemaError`] should list every
    /// offending field it can find, not just the first.
    fn parse(&self, value: &serde_json::Value) -> Result<T, SchemaError>;
}

impl<T, S: Schema<T> + ?Sized> Schema<T> for Arc<S> {
    fn parse(&self, value: &serde_json::Value) -> Result<T, SchemaError> { (**self).parse(value) }
}

impl<T, S: Schema<T> + ?Sized> Schema<T> for Box<S> {
    fn parse(&self, value: &serde_json::Value) -> Result<T, SchemaError> { (**self).parse(value) }
}

/// A single problem found while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Issue {
    /// Dotted path to the offending field; empty for the root.
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// The structured error a [`Schema`] returns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct SchemaError {
    issues: Vec<Issue>,
}

impl SchemaError {
    #[must_use]
    pub fn new(issues: Vec<Issue>) -> Self { Self { issues } }

    /// Shorthand for an error with a single issue.
    pub fn single<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::new(vec![Issue::new(path, message)])
    }

    #[must_use]
    pub fn issues(&self) -> &[Issue] { &self.issues }
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.issues.is_empty() {
            return f.write_str("invalid value");
        }

        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            issue.fmt(f)?;
        }

        Ok(())
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(error: serde_json::Error) -> Self { Self::single("", error.to_string()) }
}

/// A schema backed by `T`'s [`serde::Deserialize`] implementation.
pub struct SerdeSchema<T>(PhantomData<fn() -> T>);

impl<T> SerdeSchema<T> {
    #[must_use]
    pub fn new() -> Self { Self(PhantomData) }
}

impl<T> Default for SerdeSchema<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Clone for SerdeSchema<T> {
    fn clone(&self) -> Self { Self::new() }
}

impl<T> std::fmt::Debug for SerdeSchema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SerdeSchema")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T: serde::de::DeserializeOwned> Schema<T> for SerdeSchema<T> {
    fn parse(&self, value: &serde_json::Value) -> Result<T, SchemaError> {
        T::deserialize(value).map_err(SchemaError::from)
    }
}

/// A schema built from a closure.
///
/// See [`schema_fn`].
#[derive(Clone)]
pub struct SchemaFn<F>(F);

/// Creates a [`Schema`] from a closure.
///
/// ```
/// use batchq::schema::{schema_fn, Schema, SchemaError};
///
/// let positive = schema_fn(|value: &serde_json::Value| {
///     value
///         .as_u64()
///         .filter(|v| *v > 0)
///         .ok_or_else(|| SchemaError::single("", "expected a positive integer"))
/// });
///
/// assert_eq!(positive.parse(&serde_json::json!(4)).unwrap(), 4);
/// assert!(positive.parse(&serde_json::json!(0)).is_err());
/// ```
pub fn schema_fn<T, F>(f: F) -> SchemaFn<F>
where
    F: Fn(&serde_json::Value) -> Result<T, SchemaError> + Send + Sync,
{
    SchemaFn(f)
}

impl<T, F> Schema<T> for SchemaFn<F>
where
    F: Fn(&serde_json::Value) -> Result<T, SchemaError> + Send + Sync,
{
    fn parse(&self, value: &serde_json::Value) -> Result<T, SchemaError> { (self.0)(value) }
}

impl<F> std::fmt::Debug for SchemaFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaFn").finish_non_exhaustive()
    }
}
