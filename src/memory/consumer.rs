use crate::consumer::{Message, MessageBatch, MessageId, RetryOptions};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Resolution {
    Acknowledged,
    Retried(RetryOptions),
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum MemoryError {
    #[error("message {id} was already resolved as {previous:?}")]
    AlreadyResolved { id: MessageId, previous: Resolution },
}

#[derive(Debug)]
pub struct MemoryMessage {
    id: MessageId,
    timestamp: SystemTime,
    body: serde_json::Value,
    resolutions: Mutex<Vec<Resolution>>,
}

impl MemoryMessage {
    pub fn new<I: Into<MessageId>>(id: I, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            timestamp: SystemTime::now(),
            body,
            resolutions: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_timestamp(self, timestamp: SystemTime) -> Self { Self { timestamp, ..self } }

    /// Every resolution applied to this message, in order.
    pub fn resolutions(&self) -> Vec<Resolution> {
        self.resolutions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The resolution that took effect, if any.
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolutions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .first()
            .copied()
    }

    fn resolve(&self, resolution: Resolution) -> Result<(), MemoryError> {
        let mut resolutions = self
            .resolutions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = resolutions.first().copied();
        resolutions.push(resolution);

        match previous {
            Some(previous) => Err(MemoryError::AlreadyResolved {
                id: self.id.clone(),
                previous,
            }),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Message for MemoryMessage {
    type Error = MemoryError;

    fn id(&self) -> &MessageId { &self.id }

    fn timestamp(&self) -> SystemTime { self.timestamp }

    fn body(&self) -> &serde_json::Value { &self.body }

    async fn ack(&self) -> Result<(), Self::Error> { self.resolve(Resolution::Acknowledged) }

    async fn retry(&self, options: RetryOptions) -> Result<(), Self::Error> {
        self.resolve(Resolution::Retried(options))
    }
}

#[derive(Debug)]
pub struct MemoryBatch {
    queue: String,
    messages: Vec<MemoryMessage>,
}

impl MemoryBatch {
    pub fn new<Q: Into<String>>(queue: Q) -> Self {
        Self {
            queue: queue.into(),
            messages: Vec::new(),
        }
    }

    /// Creates a batch from bodies, numbering the messages from 1.
    pub fn from_bodies<Q, I>(queue: Q, bodies: I) -> Self
    where
        Q: Into<String>,
        I: IntoIterator<Item = serde_json::Value>,
    {
        bodies
            .into_iter()
            .enumerate()
            .fold(Self::new(queue), |batch, (i, body)| {
                batch.with_message((i + 1).to_string(), body)
            })
    }

    #[must_use]
    pub fn with_message<I: Into<MessageId>>(self, id: I, body: serde_json::Value) -> Self {
        self.with(MemoryMessage::new(id, body))
    }

    #[must_use]
    pub fn with(mut self, message: MemoryMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn len(&self) -> usize { self.messages.len() }

    pub fn is_empty(&self) -> bool { self.messages.is_empty() }

    /// The ids of the messages that were acknowledged, in batch
    /// order.
    pub fn acknowledged(&self) -> Vec<&MessageId> {
        self.messages
            .iter()
            .filter(|message| message.resolution() == Some(Resolution::Acknowledged))
            .map(|message| &message.id)
            .collect()
    }

    /// The messages that were retried, with the options they were
    /// retried with, in batch order.
    pub fn retried(&self) -> Vec<(&MessageId, RetryOptions)> {
        self.messages
            .iter()
            .filter_map(|message| match message.resolution() {
                Some(Resolution::Retried(options)) => Some((&message.id, options)),
                _ => None,
            })
            .collect()
    }

    /// The ids of the messages nothing was done to.
    pub fn unresolved(&self) -> Vec<&MessageId> {
        self.messages
            .iter()
            .filter(|message| message.resolution().is_none())
            .map(|message| &message.id)
            .collect()
    }

    /// Whether any message was resolved more than once.
    pub fn has_double_resolution(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.resolutions().len() > 1)
    }
}

#[async_trait::async_trait]
impl MessageBatch for MemoryBatch {
    type Message = MemoryMessage;

    fn queue(&self) -> &str { &self.queue }

    fn messages(&self) -> &[Self::Message] { &self.messages }

    async fn ack_all(&self) -> Result<(), MemoryError> {
        self.messages
            .iter()
            .map(|message| message.resolve(Resolution::Acknowledged))
            .fold(Ok(()), Result::and)
    }

    async fn retry_all(&self, options: RetryOptions) -> Result<(), MemoryError> {
        self.messages
            .iter()
            .map(|message| message.resolve(Resolution::Retried(options)))
            .fold(Ok(()), Result::and)
    }
}
