use crate::error::{ValidationError, ValidationTarget};
use crate::schema::Schema;
use std::time::Duration;

/// The sending half of a transport.
///
/// All a transport must do here is put messages on the queue; the
/// [`Producer`] takes care of serializing and validating them first,
/// so a transport only ever sees bodies that passed the schema.
#[async_trait::async_trait]
pub trait ProducerTransport {
    /// The error for the transport.
    ///
    /// This is used to return errors from the send methods.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends a single message.
    async fn send(&self, body: serde_json::Value, options: SendOptions)
        -> Result<(), Self::Error>;

    /// Sends several messages at once.
    async fn send_batch(&self, messages: Vec<OutgoingMessage>) -> Result<(), Self::Error>;
}

/// How the transport should encode the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum ContentType {
    #[default]
    Json,
    Text,
    Bytes,
}

/// Per-message send options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct SendOptions {
    /// How long the transport should hold the message before
    /// delivering it.
    pub delay: Option<Duration>,
    pub content_type: Option<ContentType>,
}

impl SendOptions {
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    #[must_use]
    pub fn with_content_type(self, content_type: ContentType) -> Self {
        Self {
            content_type: Some(content_type),
            ..self
        }
    }
}

/// A validated message on its way to the transport.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct OutgoingMessage {
    pub body: serde_json::Value,
    pub options: SendOptions,
}

/// A payload paired with its own send options, for
/// [`Producer::send_batch_with_options`].
#[derive(Debug, Clone)]
pub struct BatchEntry<V> {
    pub body: V,
    pub options: SendOptions,
}

impl<V> BatchEntry<V> {
    pub fn new(body: V) -> Self {
        Self {
            body,
            options: SendOptions::default(),
        }
    }

    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        Self {
            options: self.options.with_delay(delay),
            ..self
        }
    }

    #[must_use]
    pub fn with_options(self, options: SendOptions) -> Self { Self { options, ..self } }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProducerError<E> {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to serialize {target}: {source}")]
    Serialization {
        target: ValidationTarget,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to send to the transport: {source}")]
    Transport {
        #[source]
        source: E,
    },
}

impl<E> ProducerError<E> {
    /// The index of the payload that stopped a batch send, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Validation(error) => error.index(),
            Self::Serialization {
                target: ValidationTarget::BatchItem { index },
                ..
            } => Some(*index),
            _ => None,
        }
    }
}

/// Validates payloads before handing them to a transport.
///
/// Batch sends are all-or-nothing at the validation stage: if any
/// payload fails, the transport is never called.
pub struct Producer<T, S, P> {
    schema: S,
    transport: P,
    _message: std::marker::PhantomData<fn() -> T>,
}

impl<T, S, P> Producer<T, S, P>
where
    S: Schema<T>,
    P: ProducerTransport + Sync,
{
    #[must_use = "a producer does nothing unless used"]
    pub fn new(schema: S, transport: P) -> Self {
        Self {
            schema,
            transport,
            _message: std::marker::PhantomData,
        }
    }

    pub fn transport(&self) -> &P { &self.transport }

    /// Validates and sends a single payload.
    #[tracing::instrument(skip_all, name = "queue.send")]
    pub async fn send<V>(
        &self,
        payload: &V,
        options: SendOptions,
    ) -> Result<(), ProducerError<P::Error>>
    where
        V: serde::Serialize + ?Sized,
    {
        let body = self.validate(payload, ValidationTarget::Payload)?;

        self.transport
            .send(body, options)
            .await
            .map_err(|source| ProducerError::Transport { source })
    }

    /// Validates every payload, then sends them all with the same
    /// options.
    #[tracing::instrument(skip_all, name = "queue.send_batch", fields(size = payloads.len()))]
    pub async fn send_batch<V>(
        &self,
        payloads: &[V],
        options: SendOptions,
    ) -> Result<(), ProducerError<P::Error>>
    where
        V: serde::Serialize,
    {
        let messages = payloads
            .iter()
            .enumerate()
            .map(|(index, payload)| {
                self.validate(payload, ValidationTarget::BatchItem { index })
                    .map(|body| OutgoingMessage { body, options })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.dispatch(messages).await
    }

    /// Validates every payload, then sends them all, each with its
    /// own options.
    #[tracing::instrument(skip_all, name = "queue.send_batch", fields(size = entries.len()))]
    pub async fn send_batch_with_options<V>(
        &self,
        entries: &[BatchEntry<V>],
    ) -> Result<(), ProducerError<P::Error>>
    where
        V: serde::Serialize,
    {
        let messages = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                self.validate(&entry.body, ValidationTarget::BatchItem { index })
                    .map(|body| OutgoingMessage {
                        body,
                        options: entry.options,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.dispatch(messages).await
    }

    async fn dispatch(
        &self,
        messages: Vec<OutgoingMessage>,
    ) -> Result<(), ProducerError<P::Error>> {
        if messages.is_empty() {
            tracing::debug!("empty batch; nothing to send");
            return Ok(());
        }

        self.transport
            .send_batch(messages)
            .await
            .map_err(|source| ProducerError::Transport { source })
    }

    fn validate<V>(
        &self,
        payload: &V,
        target: ValidationTarget,
    ) -> Result<serde_json::Value, ProducerError<P::Error>>
    where
        V: serde::Serialize + ?Sized,
    {
        let body = match serde_json::to_value(payload) {
            Ok(body) => body,
            Err(source) => return Err(ProducerError::Serialization { target, source }),
        };

        if let Err(source) = self.schema.parse(&body) {
            tracing::debug!(%target, %source, "payload failed validation");
            return Err(ValidationError::new(target, source).into());
        }

        Ok(body)
    }
}

impl<T, S: std::fmt::Debug, P: std::fmt::Debug> std::fmt::Debug for Producer<T, S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("schema", &self.schema)
            .field("transport", &self.transport)
            .finish()
    }
}
