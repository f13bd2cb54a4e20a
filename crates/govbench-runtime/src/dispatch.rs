//! Concurrent work dispatch.
//!
//! Two shapes, same contract:
//!
//! - [`run_pull_queue`]: a fixed pool of workers pulls from a shared queue
//!   until it is empty.
//! - [`run_bounded`]: every item gets its own task, gated by a semaphore.
//!
//! Each item is processed at most once and its outcome counted exactly
//! once. An item whose task panics is counted as `lost`, so the report
//! always adds up to what was enqueued.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// What happened to one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Succeeded,
    /// Output already present and not overwriting
    Skipped,
    Failed,
}

/// Outcome counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub enqueued: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub lost: usize,
}

impl BatchReport {
    /// Items whose outcome was recorded.
    pub fn accounted(&self) -> usize {
        self.succeeded + self.skipped + self.failed + self.lost
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed",
            self.succeeded, self.skipped, self.failed
        )?;
        if self.lost > 0 {
            write!(f, ", {} lost", self.lost)?;
        }
        write!(f, " ({} total)", self.enqueued)
    }
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn record(&self, outcome: ItemOutcome) {
        let counter = match outcome {
            ItemOutcome::Succeeded => &self.succeeded,
            ItemOutcome::Skipped => &self.skipped,
            ItemOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn report(&self, enqueued: usize) -> BatchReport {
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        let skipped = self.skipped.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        BatchReport {
            enqueued,
            succeeded,
            skipped,
            failed,
            lost: enqueued.saturating_sub(succeeded + skipped + failed),
        }
    }
}

/// A pre-populated queue that workers drain without blocking.
#[derive(Debug)]
pub struct WorkQueue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> WorkQueue<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().collect()),
        }
    }

    /// Take the next item, or `None` once the queue is drained.
    pub fn try_take(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

/// Drain `items` with `max(workers, 1)` worker tasks.
///
/// A worker that panics stops pulling; the item it held, and anything left
/// in the queue if every worker died, is reported as lost.
pub async fn run_pull_queue<T, F, Fut>(items: Vec<T>, workers: usize, process: F) -> BatchReport
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ItemOutcome> + Send + 'static,
{
    let enqueued = items.len();
    let queue = Arc::new(WorkQueue::new(items));
    let counters = Arc::new(Counters::default());
    let process = Arc::new(process);
    let workers = workers.max(1);

    tracing::debug!(workers, items = enqueued, "Starting worker pool");

    let handles = (0..workers).map(|worker| {
        let queue = Arc::clone(&queue);
        let counters = Arc::clone(&counters);
        let process = Arc::clone(&process);
        tokio::spawn(async move {
            while let Some(item) = queue.try_take() {
                let outcome = process(item).await;
                counters.record(outcome);
            }
            tracing::debug!(worker, "Queue drained, worker exiting");
        })
    });

    for result in join_all(handles).await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Worker terminated abnormally");
        }
    }

    counters.report(enqueued)
}

/// Spawn every item at once, running at most `max(limit, 1)` concurrently.
///
/// Permits are released on drop, so a panicking task frees its slot.
pub async fn run_bounded<T, F, Fut>(items: Vec<T>, limit: usize, process: F) -> BatchReport
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ItemOutcome> + Send + 'static,
{
    let enqueued = items.len();
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let counters = Arc::new(Counters::default());
    let process = Arc::new(process);

    tracing::debug!(limit = limit.max(1), items = enqueued, "Launching bounded tasks");

    let handles = items.into_iter().map(|item| {
        let semaphore = Arc::clone(&semaphore);
        let counters = Arc::clone(&counters);
        let process = Arc::clone(&process);
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                counters.record(ItemOutcome::Failed);
                return;
            };
            let outcome = process(item).await;
            counters.record(outcome);
        })
    });

    for result in join_all(handles).await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Task terminated abnormally");
        }
    }

    counters.report(enqueued)
}
