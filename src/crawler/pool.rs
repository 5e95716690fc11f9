//! Worker pool draining the job queue
//!
//! Each worker is a tokio task running a small state machine:
//!
//! - `Running`: stop if cancelled, or if the queue is empty and discovery
//!   is finished. Otherwise pop the next entry.
//! - On the terminal marker: put it back for the other workers. Keep going
//!   only if jobs are still queued (a retry can land behind the marker).
//! - On a job: move to `Draining`, harvest the item, hand the record to the
//!   sink or apply the retry policy, then return to `Running`.
//!
//! Every worker that reaches the marker re-queues it, so the marker is seen
//! by all of them and the pool always drains.

use crate::config::{CrawlerConfig, RetryPolicy};
use crate::crawler::extractor::{ExtractError, Site};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::ledger::RetryLedger;
use crate::crawler::queue::{JobQueue, QueueEntry};
use crate::output::HarvestCounters;
use crate::state::{Record, TerminationFlag, WorkItem, WorkerState};
use crate::storage::RecordSink;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// When and how often a failed item is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    pub policy: RetryPolicy,
    pub max_attempts: u32,
}

impl RetryOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            policy: config.retry_policy,
            max_attempts: config.max_attempts,
        }
    }

    /// Whether an item that failed on attempt number `attempts` goes back on the queue
    pub fn should_retry(&self, error: &ExtractError, attempts: u32) -> bool {
        match self.policy {
            RetryPolicy::Never => false,
            RetryPolicy::OnFetchFailure => error.is_retryable() && attempts < self.max_attempts,
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Final state of one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: usize,
    pub final_state: WorkerState,

    /// Work items this worker attempted, retries included
    pub processed: u64,
}

/// Reports of every worker in the pool, ordered by worker id
#[derive(Debug, Clone, Default)]
pub struct PoolReport {
    pub workers: Vec<WorkerReport>,
}

impl PoolReport {
    pub fn all_stopped(&self) -> bool {
        self.workers.iter().all(|w| w.final_state.is_terminal())
    }

    pub fn total_processed(&self) -> u64 {
        self.workers.iter().map(|w| w.processed).sum()
    }
}

/// Everything a worker shares with its siblings
struct WorkerContext<F, S> {
    fetcher: Arc<F>,
    site: Arc<S>,
    sink: Arc<dyn RecordSink>,
    queue: Arc<JobQueue>,
    flag: Arc<TerminationFlag>,
    ledger: Arc<RetryLedger>,
    counters: Arc<HarvestCounters>,
    retry: RetryOptions,
    cancel: CancellationToken,
}

impl<F, S> Clone for WorkerContext<F, S> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            site: self.site.clone(),
            sink: self.sink.clone(),
            queue: self.queue.clone(),
            flag: self.flag.clone(),
            ledger: self.ledger.clone(),
            counters: self.counters.clone(),
            retry: self.retry,
            cancel: self.cancel.clone(),
        }
    }
}

/// A fixed number of workers sharing one queue, sink and ledger
pub struct WorkerPool<F, S> {
    context: WorkerContext<F, S>,
    worker_count: usize,
}

impl<F: Fetcher, S: Site> WorkerPool<F, S> {
    /// Creates a pool with default retry options and its own ledger and counters
    ///
    /// # Arguments
    ///
    /// * `worker_count` - Number of workers; at least one is always started
    /// * `fetcher` - Fetcher used for detail pages
    /// * `site` - Extraction rules
    /// * `sink` - Receives every completed record
    /// * `queue` - Queue the workers drain
    /// * `flag` - Set once no further jobs will be discovered
    pub fn new(
        worker_count: usize,
        fetcher: Arc<F>,
        site: Arc<S>,
        sink: Arc<dyn RecordSink>,
        queue: Arc<JobQueue>,
        flag: Arc<TerminationFlag>,
    ) -> Self {
        Self {
            context: WorkerContext {
                fetcher,
                site,
                sink,
                queue,
                flag,
                ledger: Arc::new(RetryLedger::new()),
                counters: Arc::new(HarvestCounters::new()),
                retry: RetryOptions::default(),
                cancel: CancellationToken::new(),
            },
            worker_count: worker_count.max(1),
        }
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.context.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.context.cancel = cancel;
        self
    }

    pub fn with_counters(mut self, counters: Arc<HarvestCounters>) -> Self {
        self.context.counters = counters;
        self
    }

    pub fn ledger(&self) -> Arc<RetryLedger> {
        self.context.ledger.clone()
    }

    pub fn counters(&self) -> Arc<HarvestCounters> {
        self.context.counters.clone()
    }

    /// Starts every worker on the current runtime
    pub fn spawn(self) -> PoolHandle {
        let mut tasks = JoinSet::new();
        for id in 0..self.worker_count {
            tasks.spawn(run_worker(id, self.context.clone()));
        }
        tracing::debug!(workers = self.worker_count, "Worker pool started");
        PoolHandle { tasks }
    }

    /// Starts the workers and waits for all of them to stop
    pub async fn run(self) -> Result<PoolReport, JoinError> {
        self.spawn().join().await
    }
}

/// Handle on a running pool
pub struct PoolHandle {
    tasks: JoinSet<WorkerReport>,
}

impl PoolHandle {
    /// Waits for every worker to stop
    pub async fn join(mut self) -> Result<PoolReport, JoinError> {
        let mut workers = Vec::with_capacity(self.tasks.len());
        while let Some(result) = self.tasks.join_next().await {
            workers.push(result?);
        }
        workers.sort_by_key(|w| w.id);
        Ok(PoolReport { workers })
    }
}

/// Fetches the detail page for one item and extracts its record
///
/// Identity is checked before any request is made.
pub async fn harvest_item<F: Fetcher, S: Site>(
    fetcher: &F,
    site: &S,
    item: &WorkItem,
) -> Result<Record, ExtractError> {
    let url = site.detail_url(item)?;
    let detail = fetcher.fetch(&url).await;
    site.extract_record(item, site.lookup_geo(detail))
}

struct WorkerTracker {
    id: usize,
    state: WorkerState,
    processed: u64,
}

impl WorkerTracker {
    fn transition(&mut self, next: WorkerState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal worker transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(worker = self.id, from = %self.state, to = %next, "Worker state change");
        self.state = next;
    }

    fn into_report(self) -> WorkerReport {
        WorkerReport {
            id: self.id,
            final_state: self.state,
            processed: self.processed,
        }
    }
}

async fn run_worker<F: Fetcher, S: Site>(id: usize, ctx: WorkerContext<F, S>) -> WorkerReport {
    let mut worker = WorkerTracker {
        id,
        state: WorkerState::Running,
        processed: 0,
    };

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }
        if ctx.flag.is_set() && ctx.queue.is_empty() {
            break;
        }

        let entry = tokio::select! {
            entry = ctx.queue.pop() => entry,
            _ = ctx.cancel.cancelled() => None,
        };

        match entry {
            None => break,
            Some(QueueEntry::Terminal) => {
                let jobs_remaining = !ctx.queue.is_empty();
                if ctx.queue.requeue(QueueEntry::Terminal).is_err() {
                    break;
                }
                if !jobs_remaining {
                    break;
                }
                tokio::task::yield_now().await;
            }
            Some(QueueEntry::Job(item)) => {
                worker.transition(WorkerState::Draining);
                worker.processed += 1;

                let finished = tokio::select! {
                    _ = process_item(id, &ctx, item) => true,
                    _ = ctx.cancel.cancelled() => false,
                };
                if !finished {
                    break;
                }
                worker.transition(WorkerState::Running);
            }
        }
    }

    worker.transition(WorkerState::Stopped);
    tracing::debug!(worker = id, processed = worker.processed, "Worker stopped");
    worker.into_report()
}

async fn process_item<F: Fetcher, S: Site>(worker: usize, ctx: &WorkerContext<F, S>, item: WorkItem) {
    let attempt = ctx.ledger.record_attempt(&item);
    ctx.counters.record_attempt();

    match harvest_item(ctx.fetcher.as_ref(), ctx.site.as_ref(), &item).await {
        Ok(record) => {
            let url = record.url.clone();
            match ctx.sink.on_record(record) {
                Ok(()) => {
                    ctx.counters.record_emitted();
                    tracing::info!(worker, item_id = %item.item_id, url = %url, "Record emitted");
                }
                Err(e) => {
                    ctx.counters.record_sink_failure();
                    tracing::warn!(worker, item_id = %item.item_id, "Sink rejected record: {}", e);
                }
            }
        }
        Err(error) => {
            ctx.counters.record_failure(&error);
            handle_failure(worker, ctx, item, error, attempt);
        }
    }
}

fn handle_failure<F, S>(
    worker: usize,
    ctx: &WorkerContext<F, S>,
    item: WorkItem,
    error: ExtractError,
    attempt: u32,
) {
    match &error {
        ExtractError::Identity { .. } => {
            tracing::warn!(worker, item_id = %item.item_id, "Skipping work item: {}", error);
        }
        ExtractError::GeoAbsent { url } => {
            tracing::debug!(worker, item_id = %item.item_id, url = %url, "No geo data, skipping");
        }
        ExtractError::GeoFetch(cause) => {
            if ctx.retry.should_retry(&error, attempt) {
                let item_id = item.item_id.clone();
                match ctx.queue.requeue(QueueEntry::Job(item)) {
                    Ok(()) => {
                        ctx.counters.record_retry();
                        tracing::info!(
                            worker,
                            item_id = %item_id,
                            attempt,
                            max_attempts = ctx.retry.max_attempts,
                            "Detail fetch failed, retrying: {}",
                            cause
                        );
                    }
                    Err(_) => {
                        tracing::debug!(worker, item_id = %item_id, "Queue closed, dropping retry");
                    }
                }
            } else {
                ctx.counters.record_abandoned();
                tracing::warn!(
                    worker,
                    item_id = %item.item_id,
                    attempt,
                    "Giving up on work item: {}",
                    cause
                );
            }
        }
    }
}
