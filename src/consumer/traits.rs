use super::{BatchProcessingResult, MessageId, MessageMetadata, RetryOptions, TypedMessage};
use crate::error::ErrorClassification;
use futures::future::BoxFuture;
use std::time::SystemTime;

/// A message, as delivered by the transport.
///
/// The transport owns these; the consumer only reads them and
/// resolves them.  Every message in a batch is resolved exactly once,
/// by either [`ack`](Message::ack) or [`retry`](Message::retry).
#[async_trait::async_trait]
pub trait Message: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn id(&self) -> &MessageId;
    fn timestamp(&self) -> SystemTime;
    fn body(&self) -> &serde_json::Value;

    /// Acknowledges the message.
    ///
    /// The message has been dealt with, successfully or not, and
    /// should not be redelivered.
    async fn ack(&self) -> Result<(), Self::Error>;
    /// Asks the transport to redeliver the message.
    async fn retry(&self, options: RetryOptions) -> Result<(), Self::Error>;
}

/// A batch of messages, as delivered by the transport.
#[async_trait::async_trait]
pub trait MessageBatch: Send + Sync {
    type Message: Message;

    /// The name of the queue the batch was delivered from.
    fn queue(&self) -> &str;
    fn messages(&self) -> &[Self::Message];

    async fn ack_all(&self) -> Result<(), <Self::Message as Message>::Error>;
    async fn retry_all(
        &self,
        options: RetryOptions,
    ) -> Result<(), <Self::Message as Message>::Error>;
}

/// Application code that handles validated messages.
///
/// Returning `Ok` acknowledges the message.  Returning an error hands
/// it to the error handler (or the default classifier) to decide
/// whether to retry; see [`crate::error`] for how to steer that.
#[async_trait::async_trait]
pub trait MessageHandler<T, B: MessageBatch, E = (), C = ()>: Send + Sync {
    async fn handle(
        &self,
        message: &TypedMessage<T>,
        metadata: MessageMetadata<'_, B, E, C>,
    ) -> anyhow::Result<()>;
}

/// A [`MessageHandler`] built from a closure.
///
/// See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F>(F);

/// Creates a [`MessageHandler`] from a closure returning a boxed
/// future.
///
/// ```
/// use batchq::consumer::handler_fn;
/// use batchq::memory::MemoryBatch;
/// use batchq::{MessageMetadata, TypedMessage};
/// use futures::FutureExt as _;
///
/// let handler = handler_fn(|message: &TypedMessage<u64>, _: MessageMetadata<'_, MemoryBatch>| {
///     let value = message.body;
///     async move {
///         anyhow::ensure!(value < 10, "value too large");
///         Ok(())
///     }
///     .boxed()
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<T, B, E, C, F>(f: F) -> HandlerFn<F>
where
    B: MessageBatch,
    F: for<'a> Fn(
            &'a TypedMessage<T>,
            MessageMetadata<'a, B, E, C>,
        ) -> BoxFuture<'a, anyhow::Result<()>>
        + Send
        + Sync,
{
    HandlerFn(f)
}

#[async_trait::async_trait]
impl<T, B, E, C, F> MessageHandler<T, B, E, C> for HandlerFn<F>
where
    T: Sync,
    B: MessageBatch,
    E: Sync,
    C: Sync,
    F: for<'a> Fn(
            &'a TypedMessage<T>,
            MessageMetadata<'a, B, E, C>,
        ) -> BoxFuture<'a, anyhow::Result<()>>
        + Send
        + Sync,
{
    async fn handle(
        &self,
        message: &TypedMessage<T>,
        metadata: MessageMetadata<'_, B, E, C>,
    ) -> anyhow::Result<()> {
        (self.0)(message, metadata).await
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

/// A [`MessageHandler`] backed by a [`tower::Service`].
///
/// The service is cloned for every message, and is given its own
/// copy of the typed message; it does not see the metadata.
#[derive(Debug, Clone)]
pub struct ServiceHandler<S>(S);

impl<S> ServiceHandler<S> {
    pub fn new(service: S) -> Self { Self(service) }
}

#[async_trait::async_trait]
impl<T, B, E, C, S> MessageHandler<T, B, E, C> for ServiceHandler<S>
where
    T: Clone + Send + Sync + 'static,
    B: MessageBatch,
    E: Sync,
    C: Sync,
    S: tower::Service<TypedMessage<T>, Response = ()> + Clone + Send + Sync,
    S::Error: Into<anyhow::Error>,
    S::Future: Send,
{
    async fn handle(
        &self,
        message: &TypedMessage<T>,
        _metadata: MessageMetadata<'_, B, E, C>,
    ) -> anyhow::Result<()> {
        use tower::ServiceExt as _;

        self.0
            .clone()
            .oneshot(message.clone())
            .await
            .map_err(Into::into)
    }
}

/// Overrides the default classifier for handler failures.
///
/// Whatever this returns is final: a `Retry` here skips the retry
/// policy's own predicate.  It does not skip the attempt limit.
/// Validation failures never reach it.
pub trait ErrorHandler<T, B: MessageBatch, E = (), C = ()>: Send + Sync {
    fn classify(
        &self,
        error: &anyhow::Error,
        body: Option<&T>,
        metadata: &MessageMetadata<'_, B, E, C>,
    ) -> ErrorClassification;
}

impl<T, B: MessageBatch, E, C> ErrorHandler<T, B, E, C> for () {
    fn classify(
        &self,
        error: &anyhow::Error,
        _body: Option<&T>,
        _metadata: &MessageMetadata<'_, B, E, C>,
    ) -> ErrorClassification {
        crate::error::classify(error)
    }
}

/// An [`ErrorHandler`] built from a closure.
///
/// See [`error_handler_fn`].
#[derive(Clone)]
pub struct ErrorHandlerFn<F>(F);

pub fn error_handler_fn<T, B, E, C, F>(f: F) -> ErrorHandlerFn<F>
where
    B: MessageBatch,
    F: Fn(&anyhow::Error, Option<&T>, &MessageMetadata<'_, B, E, C>) -> ErrorClassification
        + Send
        + Sync,
{
    ErrorHandlerFn(f)
}

impl<T, B, E, C, F> ErrorHandler<T, B, E, C> for ErrorHandlerFn<F>
where
    B: MessageBatch,
    F: Fn(&anyhow::Error, Option<&T>, &MessageMetadata<'_, B, E, C>) -> ErrorClassification
        + Send
        + Sync,
{
    fn classify(
        &self,
        error: &anyhow::Error,
        body: Option<&T>,
        metadata: &MessageMetadata<'_, B, E, C>,
    ) -> ErrorClassification {
        (self.0)(error, body, metadata)
    }
}

impl<F> std::fmt::Debug for ErrorHandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandlerFn").finish_non_exhaustive()
    }
}

/// Lifecycle hooks.
///
/// Every method defaults to doing nothing; `()` is the no-op
/// implementation.  Hooks can't fail; if you need to report a
/// failure from one, log it.
#[async_trait::async_trait]
pub trait ConsumerHooks<T: Sync, B: MessageBatch, E: Sync = (), C: Sync = ()>: Send + Sync {
    async fn on_batch_start(&self, _batch: &B) {}

    async fn on_batch_complete(&self, _batch: &B, _result: &BatchProcessingResult) {}

    async fn on_message_success(
        &self,
        _message: &TypedMessage<T>,
        _metadata: &MessageMetadata<'_, B, E, C>,
    ) {
    }

    /// Called for every failure, whether the message was retried or
    /// acknowledged.
    async fn on_message_error(
        &self,
        _error: &anyhow::Error,
        _body: Option<&T>,
        _metadata: &MessageMetadata<'_, B, E, C>,
    ) {
    }
}

impl<T: Sync, B: MessageBatch, E: Sync, C: Sync> ConsumerHooks<T, B, E, C> for () {}
