use batchq::memory::MemoryBatch;
use batchq::schema::SerdeSchema;
use batchq::{Consumer, MessageMetadata, TypedMessage};
use futures::FutureExt as _;
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_consumer_logs_to_injected_logger() {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();

    let consumer = Consumer::from_fn(
        SerdeSchema::<serde_json::Value>::new(),
        |_: &TypedMessage<serde_json::Value>, _: MessageMetadata<'_, MemoryBatch>| {
            futures::future::ready(Err(anyhow::anyhow!("division by zero"))).boxed()
        },
    )
    .with_debug(true)
    .with_logger(subscriber)
    .build();

    let batch = MemoryBatch::from_bodies("ledger", [json!({ "amount": 10 })]);
    let result = consumer.handle(&batch, &(), &()).await;
    assert_eq!(result.failed, 1);

    let output = capture.output();
    assert!(output.contains("acknowledging failed message"), "{output}");
    assert!(output.contains("batch complete"), "{output}");
    assert!(output.contains("queue.batch"), "{output}");
}

#[tokio::test]
async fn test_debug_off_stays_quiet() {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();

    let consumer = Consumer::from_fn(
        SerdeSchema::<serde_json::Value>::new(),
        |_: &TypedMessage<serde_json::Value>, _: MessageMetadata<'_, MemoryBatch>| {
            futures::future::ready(Ok(())).boxed()
        },
    )
    .with_logger(subscriber)
    .build();

    let batch = MemoryBatch::from_bodies("ledger", [json!(1), json!(2)]);
    consumer.handle(&batch, &(), &()).await;

    let output = capture.output();
    assert!(!output.contains("message handled"), "{output}");
    assert!(!output.contains("batch complete"), "{output}");
}

#[derive(Debug, Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn output(&self) -> String { String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned() }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer { self.clone() }
}
