use super::{
    Config, Consumer, ConsumerSettings, HandlerFn, MessageBatch, MessageMetadata, TypedMessage,
};
use crate::retry::RetryPolicy;

pub struct ConsumerBuilder<T, S, H, K, X> {
    pub(super) schema: S,
    pub(super) handler: H,
    pub(super) hooks: K,
    pub(super) error_handler: Option<X>,
    pub(super) config: Config,
    pub(super) _message: std::marker::PhantomData<fn() -> T>,
}

impl<T, S, H, K, X> ConsumerBuilder<T, S, H, K, X> {
    pub fn with_handler<NH>(self, handler: NH) -> ConsumerBuilder<T, S, NH, K, X> {
        ConsumerBuilder {
            schema: self.schema,
            handler,
            hooks: self.hooks,
            error_handler: self.error_handler,
            config: self.config,
            _message: std::marker::PhantomData,
        }
    }

    /// Sets the handler from a closure; see
    /// [`handler_fn`](super::handler_fn).
    pub fn with_handler_fn<B, E, C, F>(self, f: F) -> ConsumerBuilder<T, S, HandlerFn<F>, K, X>
    where
        B: MessageBatch,
        F: for<'a> Fn(
                &'a TypedMessage<T>,
                MessageMetadata<'a, B, E, C>,
            ) -> futures::future::BoxFuture<'a, anyhow::Result<()>>
            + Send
            + Sync,
    {
        self.with_handler(super::handler_fn(f))
    }

    pub fn with_hooks<NK>(self, hooks: NK) -> ConsumerBuilder<T, S, H, NK, X> {
        ConsumerBuilder {
            schema: self.schema,
            handler: self.handler,
            hooks,
            error_handler: self.error_handler,
            config: self.config,
            _message: std::marker::PhantomData,
        }
    }

    /// Replaces the default classifier.
    ///
    /// See [`ErrorHandler`](super::ErrorHandler) for how this
    /// interacts with the retry policy.
    pub fn with_error_handler<NX>(self, error_handler: NX) -> ConsumerBuilder<T, S, H, K, NX> {
        ConsumerBuilder {
            schema: self.schema,
            handler: self.handler,
            hooks: self.hooks,
            error_handler: Some(error_handler),
            config: self.config,
            _message: std::marker::PhantomData,
        }
    }

    pub fn with_retry_policy(self, retry: RetryPolicy) -> Self {
        let config = Config {
            retry,
            ..self.config
        };

        Self { config, ..self }
    }

    /// Sets the maximum number of messages handled at once.
    ///
    /// Zero is treated as one; a consumer that runs nothing would
    /// leave every message unresolved.
    pub fn with_concurrency(self, concurrency: usize) -> Self {
        if concurrency == 0 {
            tracing::warn!("consumer concurrency of zero raised to one");
        }

        let config = Config {
            concurrency: concurrency.max(1),
            ..self.config
        };

        Self { config, ..self }
    }

    /// Enables diagnostic logging.  This has no effect on behavior.
    pub fn with_debug(self, debug: bool) -> Self {
        let config = Config {
            debug,
            ..self.config
        };

        Self { config, ..self }
    }

    /// Sends this consumer's logging to the given dispatcher, rather
    /// than the global one.
    pub fn with_logger<D: Into<tracing::Dispatch>>(self, logger: D) -> Self {
        let config = Config {
            logger: Some(logger.into()),
            ..self.config
        };

        Self { config, ..self }
    }

    /// Applies the retry policy, concurrency, and debug flag from the
    /// given settings.
    pub fn with_settings(self, settings: ConsumerSettings) -> Self {
        self.with_retry_policy(settings.retry.into())
            .with_concurrency(settings.concurrency)
            .with_debug(settings.debug)
    }

    pub fn build(self) -> Consumer<T, S, H, K, X> {
        Consumer {
            schema: self.schema,
            handler: self.handler,
            hooks: self.hooks,
            error_handler: self.error_handler,
            config: self.config,
            _message: std::marker::PhantomData,
        }
    }
}

impl<T, S: std::fmt::Debug, H: std::fmt::Debug, K, X> std::fmt::Debug
    for ConsumerBuilder<T, S, H, K, X>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerBuilder")
            .field("schema", &self.schema)
            .field("handler", &self.handler)
            .field("error_handler", &self.error_handler.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
