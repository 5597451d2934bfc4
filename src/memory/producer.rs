use super::MemoryBatch;
use crate::producer::{OutgoingMessage, ProducerTransport, SendOptions};
use std::sync::{Arc, Mutex, PoisonError};

/// An in-memory queue that collects sent messages.
///
/// Cloning this gives another handle to the same queue.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    name: Arc<str>,
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    pending: Vec<OutgoingMessage>,
    send_calls: usize,
    send_batch_calls: usize,
    delivered: u64,
}

impl MemoryQueue {
    pub fn new<N: Into<Arc<str>>>(name: N) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    /// The messages sent, and not yet delivered.
    pub fn pending(&self) -> Vec<OutgoingMessage> { self.state().pending.clone() }

    /// How many times the transport's single send was called.
    pub fn send_calls(&self) -> usize { self.state().send_calls }

    /// How many times the transport's batch send was called.
    pub fn send_batch_calls(&self) -> usize { self.state().send_batch_calls }

    /// Drains every pending message into a batch.
    ///
    /// Message ids keep counting up across deliveries, so ids are
    /// unique for the life of the queue.
    pub fn deliver(&self) -> MemoryBatch {
        let mut state = self.state();
        let start = state.delivered;
        let pending = std::mem::take(&mut state.pending);
        state.delivered += pending.len() as u64;

        pending
            .into_iter()
            .zip(start + 1..)
            .fold(MemoryBatch::new(&*self.name), |batch, (message, id)| {
                batch.with_message(id.to_string(), message.body)
            })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl ProducerTransport for MemoryQueue {
    type Error = std::convert::Infallible;

    async fn send(
        &self,
        body: serde_json::Value,
        options: SendOptions,
    ) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.send_calls += 1;
        state.pending.push(OutgoingMessage { body, options });
        Ok(())
    }

    async fn send_batch(&self, messages: Vec<OutgoingMessage>) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.send_batch_calls += 1;
        state.pending.extend(messages);
        Ok(())
    }
}
