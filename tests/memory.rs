use batchq::consumer::RetryOptions;
use batchq::memory::{MemoryBatch, MemoryError, Resolution};
use batchq::{Message as _, MessageBatch as _};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_ack_all() {
    let batch = MemoryBatch::from_bodies("events", [json!(1), json!(2), json!(3)]);

    batch.ack_all().await.expect("ack all");

    assert_eq!(batch.acknowledged().len(), 3);
    assert!(batch.unresolved().is_empty());
    assert!(!batch.has_double_resolution());
}

#[tokio::test]
async fn test_retry_all() {
    let batch = MemoryBatch::from_bodies("events", [json!(1), json!(2)]);
    let options = RetryOptions::with_delay(Duration::from_secs(15));

    batch.retry_all(options).await.expect("retry all");

    let retried = batch.retried();
    assert_eq!(retried.len(), 2);
    assert!(retried.iter().all(|(_, applied)| *applied == options));
    assert!(batch.acknowledged().is_empty());
}

#[tokio::test]
async fn test_bulk_resolution_reports_double_resolution() {
    let batch = MemoryBatch::from_bodies("events", [json!(1), json!(2)]);
    batch.messages()[1].ack().await.expect("single ack");

    let error = batch
        .retry_all(RetryOptions::with_delay(Duration::from_secs(1)))
        .await
        .expect_err("second message already resolved");

    match error {
        MemoryError::AlreadyResolved { id, previous } => {
            assert_eq!(id.to_string(), "2");
            assert_eq!(previous, Resolution::Acknowledged);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(batch.has_double_resolution());
    assert!(matches!(
        batch.messages()[0].resolution(),
        Some(Resolution::Retried(_))
    ));
    assert_eq!(batch.messages()[1].resolution(), Some(Resolution::Acknowledged));
    assert!(batch.ack_all().await.is_err());
}
