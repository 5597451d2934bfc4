use batchq::memory::{MemoryBatch, MemoryQueue};
use batchq::producer::{BatchEntry, ContentType, OutgoingMessage, ProducerError};
use batchq::schema::{schema_fn, SchemaError, SerdeSchema};
use batchq::{
    Consumer, Message as _, MessageBatch as _, MessageMetadata, Producer, ProducerTransport,
    SendOptions, TypedMessage,
};
use futures::FutureExt as _;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_send_validates() {
    let queue = MemoryQueue::new("orders");
    let producer = Producer::new(SerdeSchema::<Order>::new(), queue.clone());

    producer
        .send(&Order { id: 1, total: 250 }, SendOptions::default())
        .await
        .expect("send");

    let error = producer
        .send(&json!({ "id": "one" }), SendOptions::default())
        .await
        .expect_err("invalid payload");

    assert!(matches!(error, ProducerError::Validation(_)));
    assert_eq!(error.index(), None);
    assert_eq!(queue.send_calls(), 1);
    assert_eq!(queue.pending().len(), 1);
    assert_eq!(queue.pending()[0].body, json!({ "id": 1, "total": 250 }));
}

#[tokio::test]
async fn test_send_forwards_options() {
    let queue = MemoryQueue::new("orders");
    let producer = Producer::new(SerdeSchema::<Order>::new(), queue.clone());
    let options = SendOptions::default()
        .with_delay(Duration::from_secs(60))
        .with_content_type(ContentType::Json);

    producer
        .send(&Order { id: 2, total: 10 }, options)
        .await
        .expect("send");

    assert_eq!(queue.pending()[0].options, options);
}

#[tokio::test]
async fn test_batch_is_all_or_nothing() {
    let queue = MemoryQueue::new("orders");
    let producer = Producer::new(SerdeSchema::<Order>::new(), queue.clone());

    let error = producer
        .send_batch(
            &[
                json!({ "id": 1, "total": 5 }),
                json!({ "id": 2 }),
                json!({ "id": 3, "total": 7 }),
            ],
            SendOptions::default(),
        )
        .await
        .expect_err("invalid batch");

    assert_eq!(error.index(), Some(1));
    assert!(error.to_string().starts_with("batch payload at index 1"), "{error}");
    assert_eq!(queue.send_calls(), 0);
    assert_eq!(queue.send_batch_calls(), 0);
    assert!(queue.pending().is_empty());
}

#[tokio::test]
async fn test_batch_shares_options() {
    let queue = MemoryQueue::new("orders");
    let producer = Producer::new(SerdeSchema::<Order>::new(), queue.clone());
    let options = SendOptions::default().with_delay(Duration::from_secs(5));
    let orders = (1..=3).map(|id| Order { id, total: id * 100 }).collect::<Vec<_>>();

    producer.send_batch(&orders, options).await.expect("send batch");

    assert_eq!(queue.send_batch_calls(), 1);
    let pending = queue.pending();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|message| message.options == options));
    assert_eq!(pending[2].body, json!({ "id": 3, "total": 300 }));
}

#[tokio::test]
async fn test_batch_with_per_item_options() {
    let queue = MemoryQueue::new("orders");
    let producer = Producer::new(SerdeSchema::<Order>::new(), queue.clone());

    producer
        .send_batch_with_options(&[
            BatchEntry::new(Order { id: 1, total: 1 }),
            BatchEntry::new(Order { id: 2, total: 2 }).with_delay(Duration::from_secs(30)),
            BatchEntry::new(Order { id: 3, total: 3 })
                .with_options(SendOptions::default().with_content_type(ContentType::Text)),
        ])
        .await
        .expect("send batch");

    let delays = queue
        .pending()
        .iter()
        .map(|message| message.options.delay)
        .collect::<Vec<_>>();
    assert_eq!(delays, vec![None, Some(Duration::from_secs(30)), None]);
    assert_eq!(queue.pending()[2].options.content_type, Some(ContentType::Text));
}

#[tokio::test]
async fn test_per_item_validation_reports_index() {
    let queue = MemoryQueue::new("orders");
    let producer = Producer::new(SerdeSchema::<Order>::new(), queue.clone());

    let error = producer
        .send_batch_with_options(&[
            BatchEntry::new(json!({ "id": 1, "total": 1 })),
            BatchEntry::new(json!({ "id": 2, "total": 2 })),
            BatchEntry::new(json!({ "id": 3, "total": "free" })),
        ])
        .await
        .expect_err("invalid entry");

    assert_eq!(error.index(), Some(2));
    assert_eq!(queue.send_batch_calls(), 0);
}

#[tokio::test]
async fn test_empty_batch_is_not_sent() {
    let queue = MemoryQueue::new("orders");
    let producer = Producer::new(SerdeSchema::<Order>::new(), queue.clone());

    producer
        .send_batch::<Order>(&[], SendOptions::default())
        .await
        .expect("empty batch");

    assert_eq!(queue.send_batch_calls(), 0);
}

#[tokio::test]
async fn test_validation_issues_are_reported() {
    let schema = schema_fn(|value: &serde_json::Value| {
        let order: Order = serde_json::from_value(value.clone()).map_err(SchemaError::from)?;
        if order.total == 0 {
            return Err(SchemaError::single("total", "must be positive"));
        }
        Ok(order)
    });
    let producer = Producer::new(schema, MemoryQueue::new("orders"));

    let error = producer
        .send(&Order { id: 4, total: 0 }, SendOptions::default())
        .await
        .expect_err("zero total");

    match error {
        ProducerError::Validation(validation) => {
            assert_eq!(validation.issues().len(), 1);
            assert_eq!(validation.issues()[0].path, "total");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_transport_errors_surface() {
    let producer = Producer::new(SerdeSchema::<Order>::new(), Unreachable::default());

    let error = producer
        .send(&Order { id: 1, total: 1 }, SendOptions::default())
        .await
        .expect_err("transport down");

    assert!(matches!(error, ProducerError::Transport { .. }));
    assert_eq!(producer.transport().attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_round_trip_through_consumer() {
    let queue = MemoryQueue::new("orders");
    let producer = Producer::new(SerdeSchema::<Order>::new(), queue.clone());
    let seen = Arc::new(AtomicUsize::new(0));

    producer
        .send(&Order { id: 1, total: 40 }, SendOptions::default())
        .await
        .expect("send");
    producer
        .send_batch(
            &[Order { id: 2, total: 2 }, Order { id: 3, total: 60 }],
            SendOptions::default(),
        )
        .await
        .expect("send batch");

    let consumer = Consumer::from_fn(SerdeSchema::<Order>::new(), {
        let seen = Arc::clone(&seen);
        move |message: &TypedMessage<Order>, _: MessageMetadata<'_, MemoryBatch>| {
            seen.fetch_add(message.body.total as usize, Ordering::SeqCst);
            futures::future::ready(Ok(())).boxed()
        }
    })
    .build();

    let batch = queue.deliver();
    assert_eq!(batch.len(), 3);
    let result = consumer.handle(&batch, &(), &()).await;

    assert!(result.is_success());
    assert_eq!(seen.load(Ordering::SeqCst), 102);
    assert!(queue.pending().is_empty());

    producer
        .send(&Order { id: 4, total: 4 }, SendOptions::default())
        .await
        .expect("send");
    let next = queue.deliver();
    assert_eq!(next.acknowledged().len(), 0);
    assert_eq!(next.messages()[0].id().to_string(), "4");
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Order {
    id: u64,
    total: u64,
}

#[derive(Debug, Default)]
struct Unreachable {
    attempts: AtomicUsize,
}

#[async_trait::async_trait]
impl ProducerTransport for Unreachable {
    type Error = std::io::Error;

    async fn send(
        &self,
        _body: serde_json::Value,
        _options: SendOptions,
    ) -> Result<(), Self::Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "queue unreachable"))
    }

    async fn send_batch(&self, _messages: Vec<OutgoingMessage>) -> Result<(), Self::Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "queue unreachable"))
    }
}
