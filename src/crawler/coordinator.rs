//! Crawler coordinator - main harvest orchestration logic
//!
//! The coordinator owns one run from start to finish:
//! - Starting the worker pool on a fresh queue
//! - Visiting each seed once, in order, and queueing what it lists
//! - Announcing the end of discovery (flag plus terminal marker)
//! - Joining the pool and summarizing the outcome
//!
//! The pool is started before discovery so that a bounded queue is drained
//! while seeds are still being visited.

use crate::config::Config;
use crate::crawler::extractor::{FlickrSite, Site};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::pool::{RetryOptions, WorkerPool, WorkerReport};
use crate::crawler::queue::{JobQueue, QueueEntry};
use crate::output::{HarvestCounters, HarvestStats};
use crate::state::TerminationFlag;
use crate::storage::{RecordSink, RunStatus, RunTotals};
use crate::HarvestError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Outcome of one harvest run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Seeds in the configuration, duplicates included
    pub seeds_total: usize,

    /// Distinct seeds handed to the fetcher
    pub seeds_visited: usize,

    /// Visited seeds whose fetch or discovery failed
    pub seeds_failed: usize,

    pub items_discovered: usize,
    pub stats: HarvestStats,
    pub workers: Vec<WorkerReport>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl CrawlSummary {
    /// Counters stored on the run row
    pub fn run_totals(&self) -> RunTotals {
        RunTotals {
            seeds_visited: self.seeds_visited as u64,
            items_discovered: self.items_discovered as u64,
            records_emitted: self.stats.records_emitted,
            items_failed: self.stats.items_failed(),
        }
    }

    pub fn run_status(&self) -> RunStatus {
        if self.cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        }
    }
}

#[derive(Debug, Default)]
struct DiscoveryTally {
    seeds_visited: usize,
    seeds_failed: usize,
    items_discovered: usize,
}

/// Main harvest coordinator
pub struct Coordinator<F = HttpFetcher, S = FlickrSite> {
    config: Arc<Config>,
    fetcher: Arc<F>,
    site: Arc<S>,
    sink: Arc<dyn RecordSink>,
    cancel: CancellationToken,
}

impl Coordinator<HttpFetcher, FlickrSite> {
    /// Creates a coordinator that fetches over HTTP with Flickr extraction rules
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `sink` - Receives every completed record
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - The HTTP client could not be built or the base URL is invalid
    pub fn new(config: Config, sink: Arc<dyn RecordSink>) -> Result<Self, HarvestError> {
        let fetcher = HttpFetcher::from_config(&config.user_agent, &config.crawler)?;
        let site = FlickrSite::new(&config.site.base_url)?;
        Ok(Self::with_parts(config, Arc::new(fetcher), Arc::new(site), sink))
    }
}

impl<F: Fetcher, S: Site> Coordinator<F, S> {
    /// Creates a coordinator from explicit collaborators
    pub fn with_parts(config: Config, fetcher: Arc<F>, site: Arc<S>, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            site,
            sink,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts discovery and stops the workers when cancelled
    ///
    /// Cancellation is permanent for this coordinator: once the token is
    /// cancelled, every later `run` returns at once as interrupted without
    /// fetching anything. Build a new coordinator to harvest again.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs one complete harvest
    ///
    /// Per-seed and per-item failures are logged and counted; only a
    /// panicked worker surfaces as an error.
    pub async fn run(&self) -> Result<CrawlSummary, HarvestError> {
        let started = Instant::now();
        let crawler = &self.config.crawler;
        let worker_count = crawler.effective_worker_count();

        tracing::info!(
            seeds = self.config.seeds.len(),
            workers = worker_count,
            "Starting harvest"
        );

        let queue = Arc::new(JobQueue::new(crawler.queue_bound(), self.cancel.child_token()));
        let flag = Arc::new(TerminationFlag::new());
        let counters = Arc::new(HarvestCounters::new());

        let pool = WorkerPool::new(
            worker_count,
            self.fetcher.clone(),
            self.site.clone(),
            self.sink.clone(),
            queue.clone(),
            flag.clone(),
        )
        .with_retry(RetryOptions::from_config(crawler))
        .with_counters(counters.clone())
        .with_cancellation(self.cancel.clone());
        let handle = pool.spawn();

        let tally = self.discover_seeds(&queue).await;

        flag.set();
        if queue.push(QueueEntry::Terminal).await.is_err() {
            tracing::debug!("Queue closed before the terminal marker was queued");
        }
        tracing::debug!(
            items = tally.items_discovered,
            "Discovery finished, waiting for workers"
        );

        let report = handle.join().await?;
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            tracing::warn!("Harvest cancelled");
        }

        let summary = CrawlSummary {
            seeds_total: self.config.seeds.len(),
            seeds_visited: tally.seeds_visited,
            seeds_failed: tally.seeds_failed,
            items_discovered: tally.items_discovered,
            stats: counters.snapshot(),
            workers: report.workers,
            cancelled,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            records = summary.stats.records_emitted,
            discovered = summary.items_discovered,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Harvest finished"
        );

        Ok(summary)
    }

    /// Visits every distinct seed in order and queues its work items
    async fn discover_seeds(&self, queue: &JobQueue) -> DiscoveryTally {
        let mut tally = DiscoveryTally::default();
        let mut visited: HashSet<&str> = HashSet::new();

        'seeds: for seed in &self.config.seeds {
            if self.cancel.is_cancelled() {
                break;
            }
            if !visited.insert(seed.as_str()) {
                tracing::debug!(url = %seed, "Seed already visited, skipping");
                continue;
            }
            tally.seeds_visited += 1;

            let page = tokio::select! {
                page = self.fetcher.fetch(seed) => page,
                _ = self.cancel.cancelled() => break,
            };

            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(url = %seed, "Failed to fetch seed: {}", e);
                    tally.seeds_failed += 1;
                    continue;
                }
            };

            let items = match self.site.discover(&page) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!(url = %seed, "No work items discovered: {}", e);
                    tally.seeds_failed += 1;
                    continue;
                }
            };

            tracing::info!(url = %seed, items = items.len(), "Discovered work items");
            for item in items {
                if queue.push(QueueEntry::Job(item)).await.is_err() {
                    break 'seeds;
                }
                tally.items_discovered += 1;
            }
        }

        tally
    }
}
