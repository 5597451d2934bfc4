//! # In-memory provider
//!
//! A transport that keeps everything in process memory.  It has no
//! durability and no redelivery of its own; it exists so that the
//! consumer and producer can be driven without a real queue, and it
//! records everything that happens to each message so that you can
//! check it afterwards.
//!
//! ## Consumer
//!
//! A [`MemoryBatch`] is a list of [`MemoryMessage`]s under a queue
//! name.  Each message remembers every [`Resolution`] applied to it,
//! in order.  The first resolution wins; any later one is still
//! recorded, but the call fails with [`MemoryError::AlreadyResolved`],
//! which makes double-resolution bugs easy to spot.
//!
//! ## Producer
//!
//! A [`MemoryQueue`] collects everything sent to it.  Calling
//! [`MemoryQueue::deliver`] drains the collected messages into a new
//! [`MemoryBatch`], numbering them in the order they were sent, so
//! that a producer and a consumer can be wired together end to end.
//! Delays are recorded, not honored.

mod consumer;
mod producer;

pub use self::consumer::{MemoryBatch, MemoryError, MemoryMessage, Resolution};
pub use self::producer::MemoryQueue;
