//! # Batch queue processing.
//!
//! A small core that sits between a queue that delivers messages in
//! batches and the application code that handles them.  The queue
//! itself is assumed to do three things:
//!
//! 1. Deliver messages at least once, in batches;
//! 2. Let each delivered message be acknowledged (handled, don't send
//!    it again) or retried (send it again, maybe after a delay);
//! 3. Accept new messages, one at a time or in batches.
//!
//! Everything else - checking that bodies are what the handler
//! expects, running handlers concurrently without running *all* of
//! them at once, deciding which failures are worth retrying and for
//! how long to wait, and making sure every message is resolved
//! exactly once - happens here.
//!
//! Note that this never gives you exactly-once delivery.  The queue
//! delivers at least once, so a handler may see the same message
//! more than once, and should be written with that in mind.
//!
//! ## Usage
//!
//! This library is split in two parts: the consumer, and the
//! producer.  The producer is much more simple; all it has to do is
//! check that each payload matches the schema before handing it to
//! the queue.  The consumer does the same check on the way out, and
//! then takes care of the handler, the retry decision, and the
//! bookkeeping.
//!
//! Thus, the consumer is gated behind the `consumer` feature, and the
//! producer is gated behind the `producer` feature.  This allows you
//! to use the library as-needed.
//!
//! The queue itself is plugged in through the traits in each half:
//! [`consumer::Message`] and [`consumer::MessageBatch`] for delivered
//! messages, and [`producer::ProducerTransport`] for sending.  The
//! `memory` feature provides an in-process implementation of both,
//! which is mostly useful for tests.
//!
//! ```
//! use batchq::memory::{MemoryBatch, MemoryQueue};
//! use batchq::schema::SerdeSchema;
//! use batchq::{Consumer, Producer, SendOptions};
//! use futures::FutureExt as _;
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct Job {
//!     id: u64,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue = MemoryQueue::new("jobs");
//! let producer = Producer::new(SerdeSchema::<Job>::new(), queue.clone());
//! producer.send(&Job { id: 1 }, SendOptions::default()).await.unwrap();
//!
//! let consumer = Consumer::from_fn(
//!     SerdeSchema::<Job>::new(),
//!     |message: &batchq::TypedMessage<Job>, _: batchq::MessageMetadata<'_, MemoryBatch>| {
//!         let id = message.body.id;
//!         async move {
//!             anyhow::ensure!(id > 0, "job ids start at 1");
//!             Ok(())
//!         }
//!         .boxed()
//!     },
//! )
//! .build();
//!
//! let batch = queue.deliver();
//! let result = consumer.handle(&batch, &(), &()).await;
//! assert_eq!(result.successful, 1);
//! # }
//! ```

pub mod batch;
pub mod error;
pub mod retry;
pub mod schema;

#[cfg(feature = "consumer")]
pub mod consumer;
#[cfg(feature = "producer")]
pub mod producer;

#[cfg(feature = "memory")]
pub mod memory;

pub use self::error::{
    classify, extract_delay, ErrorClassification, FatalError, RetryableError, ValidationError,
};
pub use self::retry::RetryPolicy;
pub use self::schema::Schema;

#[cfg(feature = "consumer")]
pub use self::consumer::{
    BatchProcessingResult, Consumer, ConsumerHooks, Message, MessageBatch, MessageHandler,
    MessageId, MessageMetadata, TypedMessage,
};
#[cfg(feature = "producer")]
pub use self::producer::{Producer, ProducerTransport, SendOptions};
