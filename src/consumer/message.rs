use super::MessageBatch;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub(crate) String);

impl MessageId {
    /// Creates a new [`MessageId`].
    ///
    /// This is for transports; the id should be whatever the
    /// transport uses to identify a delivery, and should stay the
    /// same for the lifetime of that delivery.
    #[must_use]
    pub fn new<I: Into<String>>(id: I) -> Self { Self(id.into()) }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str { &self.0 }
}

impl std::ops::Deref for MessageId {
    type Target = str;

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { self.0.fmt(f) }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self { Self::new(id) }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self { Self(id) }
}

/// Options passed to the transport when retrying a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct RetryOptions {
    /// How long the transport should wait before redelivering.
    ///
    /// This is advisory; it is up to the transport to honor it.
    pub delay: Option<Duration>,
}

impl RetryOptions {
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self { Self { delay: Some(delay) } }
}

/// A message whose body has passed validation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TypedMessage<T> {
    pub id: MessageId,
    pub timestamp: SystemTime,
    /// The attempt within the current batch; starts at 1.
    pub attempt: u32,
    pub body: T,
}

impl<T> TypedMessage<T> {
    pub fn new(id: MessageId, timestamp: SystemTime, attempt: u32, body: T) -> Self {
        Self {
            id,
            timestamp,
            attempt,
            body,
        }
    }

    pub fn into_body(self) -> T { self.body }
}

/// Context for a single attempt at handling a message.
///
/// `env` and `ctx` are whatever the host passed into
/// [`Consumer::handle`][crate::Consumer::handle]; they're handed
/// through untouched.
#[non_exhaustive]
pub struct MessageMetadata<'a, B: MessageBatch, E = (), C = ()> {
    pub message: &'a B::Message,
    pub batch: &'a B,
    /// The attempt within the current batch; starts at 1.
    ///
    /// This is only ever more than 1 if the same message id appears
    /// more than once in a batch.  It is not a count of deliveries.
    pub attempt: u32,
    pub env: &'a E,
    pub ctx: &'a C,
}

impl<'a, B: MessageBatch, E, C> MessageMetadata<'a, B, E, C> {
    pub fn new(
        message: &'a B::Message,
        batch: &'a B,
        attempt: u32,
        env: &'a E,
        ctx: &'a C,
    ) -> Self {
        Self {
            message,
            batch,
            attempt,
            env,
            ctx,
        }
    }

    pub fn id(&self) -> &'a MessageId { super::Message::id(self.message) }

    pub fn queue(&self) -> &'a str { self.batch.queue() }
}

impl<B: MessageBatch, E, C> Clone for MessageMetadata<'_, B, E, C> {
    fn clone(&self) -> Self { *self }
}

impl<B: MessageBatch, E, C> Copy for MessageMetadata<'_, B, E, C> {}

impl<B: MessageBatch, E, C> std::fmt::Debug for MessageMetadata<'_, B, E, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageMetadata")
            .field("id", self.id())
            .field("queue", &self.queue())
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}
