use crate::batch::BatchOptions;
use crate::retry::RetryStrategy;

/// Consumer options that can be loaded from configuration.
///
/// Every field has a default, so partial configuration works:
///
/// ```
/// use batchq::consumer::ConsumerSettings;
///
/// let settings: ConsumerSettings = serde_json::from_str(r#"{ "concurrency": 4 }"#).unwrap();
///
/// assert_eq!(settings.concurrency, 4);
/// assert!(!settings.debug);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ConsumerSettings {
    pub retry: RetryStrategy,
    pub concurrency: usize,
    pub debug: bool,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            retry: RetryStrategy::default(),
            concurrency: BatchOptions::DEFAULT_CONCURRENCY,
            debug: false,
        }
    }
}
