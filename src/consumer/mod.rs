mod build;
mod config;
mod message;
mod result;
mod traits;

pub use self::build::ConsumerBuilder;
pub use self::config::ConsumerSettings;
pub use self::message::{MessageId, MessageMetadata, RetryOptions, TypedMessage};
pub use self::result::{BatchProcessingResult, MessageError};
pub use self::traits::{
    error_handler_fn, handler_fn, ConsumerHooks, ErrorHandler, ErrorHandlerFn, HandlerFn, Message,
    MessageBatch, MessageHandler, ServiceHandler,
};

use crate::batch::{self, BatchOptions};
use crate::error::{self, FatalError, ValidationError, ValidationTarget};
use crate::retry::RetryPolicy;
use crate::schema::Schema;
use futures::FutureExt as _;
use std::collections::HashMap;
use tracing::instrument::WithSubscriber as _;

/// Processes delivered batches.
///
/// Each message in a batch goes through the same steps: its body is
/// parsed with the schema, the handler is called with the typed
/// result, and the outcome decides whether the message is
/// acknowledged or handed back to the transport for a retry.  A
/// message whose body fails to parse is acknowledged straight away -
/// no amount of redelivery will fix it.
///
/// Nothing a handler does can make [`handle`](Consumer::handle) fail;
/// failures are reported through the returned
/// [`BatchProcessingResult`] and the hooks.  This matters, since most
/// hosts will redeliver the *entire* batch if the entry point fails.
/// A handler that panics is treated as if it had returned a
/// [`FatalError`].
///
/// There are two ways to supply the handler, and both give you the
/// same type: implement [`MessageHandler`] and pass it to
/// [`ConsumerBuilder::with_handler`], or pass a closure to
/// [`Consumer::from_fn`].
pub struct Consumer<T, S, H, K = (), X = ()> {
    schema: S,
    handler: H,
    hooks: K,
    error_handler: Option<X>,
    config: Config,
    _message: std::marker::PhantomData<fn() -> T>,
}

impl Consumer<(), (), (), (), ()> {
    pub fn build<T, S>(schema: S) -> ConsumerBuilder<T, S, (), (), ()>
    where
        S: Schema<T>,
    {
        ConsumerBuilder {
            schema,
            handler: (),
            hooks: (),
            error_handler: None,
            config: Config::default(),
            _message: std::marker::PhantomData,
        }
    }

    /// Starts building a consumer around a handler closure.
    ///
    /// This is shorthand for [`Consumer::build`] followed by
    /// [`ConsumerBuilder::with_handler`] with a [`handler_fn`].
    pub fn from_fn<T, S, B, E, C, F>(schema: S, f: F) -> ConsumerBuilder<T, S, HandlerFn<F>, (), ()>
    where
        S: Schema<T>,
        B: MessageBatch,
        F: for<'a> Fn(
                &'a TypedMessage<T>,
                MessageMetadata<'a, B, E, C>,
            ) -> futures::future::BoxFuture<'a, anyhow::Result<()>>
            + Send
            + Sync,
    {
        Self::build(schema).with_handler(handler_fn(f))
    }
}

impl<T, S, H, K, X> Consumer<T, S, H, K, X>
where
    T: Sync,
    S: Schema<T>,
{
    /// Handles one delivered batch.
    ///
    /// Every message in the batch is resolved - acknowledged or
    /// retried - exactly once by the time this returns.  `env` and
    /// `ctx` are passed through to the handler untouched.
    pub async fn handle<B, E, C>(&self, batch: &B, env: &E, ctx: &C) -> BatchProcessingResult
    where
        B: MessageBatch,
        E: Sync,
        C: Sync,
        H: MessageHandler<T, B, E, C>,
        K: ConsumerHooks<T, B, E, C>,
        X: ErrorHandler<T, B, E, C>,
    {
        let process = self.process_batch(batch, env, ctx);

        match &self.config.logger {
            Some(dispatch) => process.with_subscriber(dispatch.clone()).await,
            None => process.await,
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy { &self.config.retry }

    #[must_use]
    pub fn concurrency(&self) -> usize { self.config.concurrency }

    #[tracing::instrument(
        skip_all,
        name = "queue.batch",
        fields(queue = batch.queue(), size = batch.messages().len())
    )]
    async fn process_batch<B, E, C>(&self, batch: &B, env: &E, ctx: &C) -> BatchProcessingResult
    where
        B: MessageBatch,
        E: Sync,
        C: Sync,
        H: MessageHandler<T, B, E, C>,
        K: ConsumerHooks<T, B, E, C>,
        X: ErrorHandler<T, B, E, C>,
    {
        self.hooks.on_batch_start(batch).await;

        let messages = batch.messages();
        let attempts = attempt_numbers(messages);
        let options = BatchOptions::default().with_concurrency(self.config.concurrency);

        if self.config.debug {
            tracing::debug!(
                concurrency = self.config.concurrency,
                "processing {} messages",
                messages.len()
            );
        }

        let collected = batch::run_collecting(
            messages.iter().zip(attempts),
            |(message, attempt), _| {
                self.process_message(MessageMetadata::new(message, batch, attempt, env, ctx))
            },
            options,
        )
        .await;

        let result = BatchProcessingResult::from(collected);

        if self.config.debug {
            tracing::debug!(
                successful = result.successful,
                failed = result.failed,
                retried = result.retried,
                "batch complete"
            );
        }

        self.hooks.on_batch_complete(batch, &result).await;
        result
    }

    async fn process_message<B, E, C>(
        &self,
        metadata: MessageMetadata<'_, B, E, C>,
    ) -> Result<(), MessageError>
    where
        B: MessageBatch,
        E: Sync,
        C: Sync,
        H: MessageHandler<T, B, E, C>,
        K: ConsumerHooks<T, B, E, C>,
        X: ErrorHandler<T, B, E, C>,
    {
        let message = metadata.message;
        let id = message.id();

        let typed = match self.schema.parse(message.body()) {
            Ok(body) => TypedMessage::new(id.clone(), message.timestamp(), metadata.attempt, body),
            Err(source) => {
                let target = ValidationTarget::Message { id: id.to_string() };
                let error = anyhow::Error::new(ValidationError::new(target, source));

                if self.config.debug {
                    tracing::debug!(%id, %error, "message failed validation");
                }

                return Err(self.resolve_failure(error, None, &metadata, false).await);
            }
        };

        let handled = async { self.handler.handle(&typed, metadata).await };
        let outcome = std::panic::AssertUnwindSafe(handled)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                let reason = panic_message(&*panic);
                let error = FatalError::new(format!("handler panicked: {reason}"));
                tracing::error!(%id, %error, "message handler panicked");
                Err(error.into())
            });

        match outcome {
            Ok(()) => {
                if let Err(error) = message.ack().await {
                    tracing::error!(%id, %error, "failed to acknowledge message");
                }

                if self.config.debug {
                    tracing::debug!(%id, attempt = metadata.attempt, "message handled");
                }

                self.hooks.on_message_success(&typed, &metadata).await;
                Ok(())
            }
            Err(error) => {
                let retry = self.should_retry(&error, Some(&typed.body), &metadata);
                Err(self
                    .resolve_failure(error, Some(&typed.body), &metadata, retry)
                    .await)
            }
        }
    }

    fn should_retry<B, E, C>(
        &self,
        error: &anyhow::Error,
        body: Option<&T>,
        metadata: &MessageMetadata<'_, B, E, C>,
    ) -> bool
    where
        B: MessageBatch,
        X: ErrorHandler<T, B, E, C>,
    {
        let decision = match &self.error_handler {
            Some(handler) => handler.classify(error, body, metadata),
            None => error::classify(error),
        };

        if self.config.debug {
            tracing::debug!(id = %metadata.id(), ?decision, "classified handler failure");
        }

        if metadata.attempt > self.config.retry.max_attempts() {
            return false;
        }

        decision.is_retry()
            && (self.error_handler.is_some() || self.config.retry.is_retryable(error))
    }

    async fn resolve_failure<B, E, C>(
        &self,
        error: anyhow::Error,
        body: Option<&T>,
        metadata: &MessageMetadata<'_, B, E, C>,
        retry: bool,
    ) -> MessageError
    where
        B: MessageBatch,
        E: Sync,
        C: Sync,
        K: ConsumerHooks<T, B, E, C>,
    {
        let message = metadata.message;
        let id = message.id();

        let resolution = if retry {
            let delay = error::extract_delay(&error)
                .unwrap_or_else(|| self.config.retry.delay(metadata.attempt));

            if self.config.debug {
                tracing::debug!(%id, ?delay, "retrying message");
            }

            message.retry(RetryOptions::with_delay(delay)).await
        } else {
            if self.config.debug {
                tracing::debug!(%id, "acknowledging failed message");
            }

            message.ack().await
        };

        if let Err(resolve_error) = resolution {
            tracing::error!(%id, retry, error = %resolve_error, "failed to resolve message");
        }

        self.hooks.on_message_error(&error, body, metadata).await;

        MessageError {
            message_id: id.clone(),
            error,
            retried: retry,
        }
    }
}

impl<T, S: std::fmt::Debug, H: std::fmt::Debug, K, X> std::fmt::Debug for Consumer<T, S, H, K, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("schema", &self.schema)
            .field("handler", &self.handler)
            .field("error_handler", &self.error_handler.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Numbers each message by how many times its id has been seen so
/// far in the batch, in delivery order.
fn attempt_numbers<M: Message>(messages: &[M]) -> Vec<u32> {
    let mut seen: HashMap<&MessageId, u32> = HashMap::with_capacity(messages.len());

    messages
        .iter()
        .map(|message| {
            let attempt = seen.entry(message.id()).or_insert(0);
            *attempt += 1;
            *attempt
        })
        .collect()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    retry: RetryPolicy,
    concurrency: usize,
    debug: bool,
    logger: Option<tracing::Dispatch>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            concurrency: BatchOptions::DEFAULT_CONCURRENCY,
            debug: false,
            logger: None,
        }
    }
}
