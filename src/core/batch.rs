//! Bounded-concurrency batch processing.
//!
//! Node implementations use this to fan a large input out into fixed-size
//! batches, run at most `max_concurrency` of them at once, retry each failing
//! batch with linear backoff, and tolerate sporadic failures: the call only
//! fails when more than half of the items ended up in failed batches.

use crate::core::error::{BatchError, BoxError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_MAX_CONCURRENCY: usize = 4;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Work applied to one batch of items.
///
/// Any `Fn(Vec<I>) -> impl Future<Output = Result<Vec<O>, BoxError>>` closure
/// is a `BatchWork`.
#[async_trait]
pub trait BatchWork<I, O>: Send + Sync + 'static {
    async fn process(&self, batch: Vec<I>) -> Result<Vec<O>, BoxError>;
}

#[async_trait]
impl<I, O, F, Fut> BatchWork<I, O> for F
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(Vec<I>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<O>, BoxError>> + Send + 'static,
{
    async fn process(&self, batch: Vec<I>) -> Result<Vec<O>, BoxError> {
        (self)(batch).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub max_concurrency: usize,
    /// Attempts per batch, including the first one.
    pub retry_attempts: u32,
    /// Base backoff; attempt `n` waits `retry_delay * n` before retrying.
    #[serde(rename = "retry_delay_ms", with = "millis")]
    pub retry_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl BatchOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_retries(mut self, retry_attempts: u32, retry_delay: Duration) -> Self {
        self.retry_attempts = retry_attempts;
        self.retry_delay = retry_delay;
        self
    }

    pub(crate) fn check(&self) -> Result<(), BatchError> {
        if self.batch_size == 0 {
            return Err(BatchError::InvalidOptions(
                "batch_size must be greater than 0".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(BatchError::InvalidOptions(
                "max_concurrency must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// A batch that still failed after its last attempt.
#[derive(Debug, Clone)]
pub struct FailedBatch<I> {
    pub index: usize,
    pub attempts: u32,
    pub error: String,
    /// The exact chunk of input that failed.
    pub items: Vec<I>,
}

/// Everything that happened in one [`process_batches_with_report`] call.
#[derive(Debug, Clone)]
pub struct BatchReport<I, O> {
    /// Results of successful batches, concatenated in batch order.
    pub results: Vec<O>,
    /// Failed batches, in batch order.
    pub failed: Vec<FailedBatch<I>>,
    pub total_items: usize,
    pub batch_count: usize,
}

impl<I, O> BatchReport<I, O> {
    pub fn failed_items(&self) -> usize {
        self.failed.iter().map(|b| b.items.len()).sum()
    }

    /// More than half of the items sat in failed batches.
    pub fn exceeds_failure_threshold(&self) -> bool {
        self.failed_items() * 2 > self.total_items
    }
}

enum BatchOutcome<I, O> {
    Done(Vec<O>),
    Failed { attempts: u32, error: String, items: Vec<I> },
}

/// Processes `items` in batches and applies the failure-ratio policy.
///
/// Returns the successful results in input order. Fails with
/// [`BatchError::TooManyFailures`] if more than 50% of the items were in
/// batches that failed every attempt; a smaller share is logged and dropped.
pub async fn process_batches<I, O, W>(
    items: Vec<I>,
    work: W,
    options: &BatchOptions,
) -> Result<Vec<O>, BatchError>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    W: BatchWork<I, O>,
{
    let report = process_batches_with_report(items, work, options).await?;

    if let Some(first) = report.failed.first() {
        if report.exceeds_failure_threshold() {
            return Err(BatchError::TooManyFailures {
                failed: report.failed_items(),
                total: report.total_items,
                batch_index: first.index,
                message: first.error.clone(),
            });
        }
        log::warn!(
            "Partial batch failure: {} of {} items in {} batches failed; first error (batch {}): {}",
            report.failed_items(),
            report.total_items,
            report.failed.len(),
            first.index,
            first.error
        );
    }

    Ok(report.results)
}

/// Processes `items` in batches and reports successes and failures without
/// applying the failure-ratio policy.
pub async fn process_batches_with_report<I, O, W>(
    items: Vec<I>,
    work: W,
    options: &BatchOptions,
) -> Result<BatchReport<I, O>, BatchError>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    W: BatchWork<I, O>,
{
    options.check()?;

    let total_items = items.len();
    let mut chunks: Vec<Vec<I>> = items
        .chunks(options.batch_size)
        .map(<[I]>::to_vec)
        .collect();
    let batch_count = chunks.len();

    log::debug!(
        "Processing {} items in {} batches (batch_size={}, max_concurrency={})",
        total_items,
        batch_count,
        options.batch_size,
        options.max_concurrency
    );

    let work = Arc::new(work);
    // tokio's semaphore is fair: the longest-waiting batch gets the next slot.
    let semaphore = Arc::new(Semaphore::new(options.max_concurrency));
    let attempts = options.retry_attempts.max(1);
    let retry_delay = options.retry_delay;

    // Dropping the set aborts every batch still queued or running, so a
    // cancelled caller stops the work it started.
    let mut tasks = JoinSet::new();
    let mut task_batches = HashMap::with_capacity(batch_count);
    for (index, chunk) in chunks.iter().cloned().enumerate() {
        let work = Arc::clone(&work);
        let semaphore = Arc::clone(&semaphore);
        let handle = tasks.spawn(async move {
            // Held until the task ends, whatever the outcome.
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    let outcome = BatchOutcome::Failed {
                        attempts: 0,
                        error: e.to_string(),
                        items: chunk,
                    };
                    return (index, outcome);
                }
            };
            let outcome = run_with_retry(index, chunk, work.as_ref(), attempts, retry_delay).await;
            (index, outcome)
        });
        task_batches.insert(handle.id(), index);
    }

    let mut outcomes: Vec<Option<BatchOutcome<I, O>>> = (0..batch_count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(join_error) => {
                let Some(&index) = task_batches.get(&join_error.id()) else {
                    log::error!("Unknown batch task failed: {}", join_error);
                    continue;
                };
                log::error!("Batch {} task panicked: {}", index, join_error);
                outcomes[index] = Some(BatchOutcome::Failed {
                    attempts: 0,
                    error: format!("batch task panicked: {join_error}"),
                    items: std::mem::take(&mut chunks[index]),
                });
            }
        }
    }

    let mut results = Vec::new();
    let mut failed = Vec::new();
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Some(BatchOutcome::Done(mut out)) => results.append(&mut out),
            Some(BatchOutcome::Failed {
                attempts,
                error,
                items,
            }) => failed.push(FailedBatch {
                index,
                attempts,
                error,
                items,
            }),
            None => failed.push(FailedBatch {
                index,
                attempts: 0,
                error: "batch task did not complete".to_string(),
                items: std::mem::take(&mut chunks[index]),
            }),
        }
    }

    Ok(BatchReport {
        results,
        failed,
        total_items,
        batch_count,
    })
}

async fn run_with_retry<I, O, W>(
    index: usize,
    chunk: Vec<I>,
    work: &W,
    attempts: u32,
    retry_delay: Duration,
) -> BatchOutcome<I, O>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
    W: BatchWork<I, O>,
{
    let mut attempt = 1;
    loop {
        match work.process(chunk.clone()).await {
            Ok(out) => {
                log::debug!("Batch {} succeeded on attempt {}", index, attempt);
                return BatchOutcome::Done(out);
            }
            Err(e) if attempt >= attempts => {
                log::warn!("Batch {} failed after {} attempts: {}", index, attempt, e);
                return BatchOutcome::Failed {
                    attempts: attempt,
                    error: e.to_string(),
                    items: chunk,
                };
            }
            Err(e) => {
                log::debug!("Batch {} attempt {} failed, retrying: {}", index, attempt, e);
                tokio::time::sleep(retry_delay * attempt).await;
                attempt += 1;
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
