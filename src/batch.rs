//! # Batch processing
//!
//! Runs an async operation over a set of items with at most a fixed
//! number of invocations in flight at once.  Items are admitted to
//! the window in order; they may complete in any order.
//!
//! There are two flavors:
//!
//! - [`run`] returns every result, index-aligned with the input, or
//!   the first error it saw.  An error stops new items from being
//!   admitted, but anything already in flight is allowed to finish -
//!   nothing is ever cancelled.
//! - [`run_collecting`] never fails; it tallies successes and
//!   failures into a [`Collected`] instead.  The consumer uses this
//!   one.

use futures::stream::{FuturesUnordered, StreamExt as _};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Options for [`run_collecting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct BatchOptions {
    /// The maximum number of items in flight at once.
    pub concurrency: usize,
    /// Process items one at a time, and stop at the first failure.
    pub stop_on_error: bool,
}

impl BatchOptions {
    pub const DEFAULT_CONCURRENCY: usize = 10;

    #[must_use]
    pub fn with_concurrency(self, concurrency: usize) -> Self {
        Self {
            concurrency,
            ..self
        }
    }

    #[must_use]
    pub fn with_stop_on_error(self, stop_on_error: bool) -> Self {
        Self {
            stop_on_error,
            ..self
        }
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: Self::DEFAULT_CONCURRENCY,
            stop_on_error: false,
        }
    }
}

/// The first failure seen by [`run`].
#[derive(Debug, thiserror::Error)]
#[error("batch item {index} failed: {source}")]
pub struct BatchError<E> {
    /// The index of the failing item in the input.
    pub index: usize,
    #[source]
    pub source: E,
}

/// The outcome of [`run_collecting`].
#[derive(Debug)]
#[non_exhaustive]
pub struct Collected<R, E> {
    /// The number of items given, processed or not.
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Index-aligned with the input; `None` for items that failed or
    /// were never processed.
    pub results: Vec<Option<R>>,
    /// Failures, in the order they completed.
    pub errors: Vec<BatchError<E>>,
}

impl<R, E> Collected<R, E> {
    fn with_capacity(total: usize) -> Self {
        Self {
            total,
            successful: 0,
            failed: 0,
            results: Vec::with_capacity(total),
            errors: Vec::new(),
        }
    }

    fn record(&mut self, index: usize, outcome: Result<R, E>) {
        match outcome {
            Ok(value) => {
                self.successful += 1;
                self.results[index] = Some(value);
            }
            Err(source) => {
                self.failed += 1;
                self.errors.push(BatchError { index, source });
            }
        }
    }
}

/// Runs `op` over every item, with at most `concurrency` in flight.
///
/// `op` is given the item and its index.  The results are returned
/// in input order, regardless of the order the invocations finished
/// in.  A `concurrency` of zero runs nothing.
#[tracing::instrument(skip_all, name = "batch.run", fields(concurrency = concurrency))]
pub async fn run<I, R, E, F, Fut>(
    items: I,
    mut op: F,
    concurrency: usize,
) -> Result<Vec<R>, BatchError<E>>
where
    I: IntoIterator,
    F: FnMut(I::Item, usize) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    if concurrency == 0 {
        tracing::warn!("batch concurrency is zero; nothing will run");
        return Ok(Vec::new());
    }

    let mut results: Vec<Option<R>> = Vec::new();
    let mut in_flight = FuturesUnordered::new();
    let mut first_error: Option<BatchError<E>> = None;

    for (index, item) in items.into_iter().enumerate() {
        if in_flight.len() >= concurrency {
            if let Some(done) = in_flight.next().await {
                settle(&mut results, &mut first_error, done);
            }
        }

        if first_error.is_some() {
            break;
        }

        results.push(None);
        in_flight.push(Indexed::new(index, op(item, index)));
    }

    while let Some(done) = in_flight.next().await {
        settle(&mut results, &mut first_error, done);
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(results.into_iter().flatten().collect()),
    }
}

fn settle<R, E>(
    results: &mut [Option<R>],
    first_error: &mut Option<BatchError<E>>,
    (index, outcome): (usize, Result<R, E>),
) {
    match outcome {
        Ok(value) => results[index] = Some(value),
        Err(source) if first_error.is_none() => {
            *first_error = Some(BatchError { index, source });
        }
        Err(_) => tracing::debug!(index, "additional batch failure after the first"),
    }
}

/// Runs `op` over every item, capturing failures instead of
/// stopping.
///
/// With [`BatchOptions::stop_on_error`] set, items are processed
/// strictly one after another, and processing halts after the first
/// failure; the remaining items are left untouched.
#[tracing::instrument(skip_all, name = "batch.collect", fields(concurrency = options.concurrency))]
pub async fn run_collecting<I, R, E, F, Fut>(
    items: I,
    mut op: F,
    options: BatchOptions,
) -> Collected<R, E>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
    F: FnMut(I::Item, usize) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let items = items.into_iter();
    let mut collected = Collected::with_capacity(items.len());
    collected.results.resize_with(collected.total, || None);

    if options.stop_on_error {
        for (index, item) in items.enumerate() {
            collected.record(index, op(item, index).await);
            if collected.failed > 0 {
                tracing::debug!(index, "stopping batch at first failure");
                break;
            }
        }

        return collected;
    }

    if options.concurrency == 0 {
        tracing::warn!("batch concurrency is zero; nothing will run");
        return collected;
    }

    let mut in_flight = FuturesUnordered::new();

    for (index, item) in items.enumerate() {
        if in_flight.len() >= options.concurrency {
            if let Some((done, outcome)) = in_flight.next().await {
                collected.record(done, outcome);
            }
        }

        in_flight.push(Indexed::new(index, op(item, index)));
    }

    while let Some((done, outcome)) = in_flight.next().await {
        collected.record(done, outcome);
    }

    collected
}

pin_project_lite::pin_project! {
    /// Tags a future's output with the index of the item it was
    /// started for.
    struct Indexed<F> {
        index: usize,
        #[pin]
        future: F,
    }
}

impl<F> Indexed<F> {
    fn new(index: usize, future: F) -> Self { Self { index, future } }
}

impl<F: Future> Future for Indexed<F> {
    type Output = (usize, F::Output);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let index = *this.index;
        this.future.poll(cx).map(|output| (index, output))
    }
}
