//! Harvest counters and statistics
//!
//! `HarvestCounters` is shared by every worker during a run; a snapshot of
//! it ends up in the crawl summary and in the run row of the database.
//! `CrawlStatistics` is read back from storage for `--stats`.

use crate::crawler::ExtractError;
use crate::storage::{RunRecord, SqliteSink, StorageResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live outcome counters, updated concurrently by the workers
#[derive(Debug, Default)]
pub struct HarvestCounters {
    attempts: AtomicU64,
    records_emitted: AtomicU64,
    identity_failures: AtomicU64,
    geo_absent: AtomicU64,
    geo_fetch_failures: AtomicU64,
    sink_failures: AtomicU64,
    retries_scheduled: AtomicU64,
    items_abandoned: AtomicU64,
}

impl HarvestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, error: &ExtractError) {
        let counter = match error {
            ExtractError::Identity { .. } => &self.identity_failures,
            ExtractError::GeoAbsent { .. } => &self.geo_absent,
            ExtractError::GeoFetch(_) => &self.geo_fetch_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.items_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HarvestStats {
        HarvestStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            identity_failures: self.identity_failures.load(Ordering::Relaxed),
            geo_absent: self.geo_absent.load(Ordering::Relaxed),
            geo_fetch_failures: self.geo_fetch_failures.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            items_abandoned: self.items_abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `HarvestCounters`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestStats {
    /// Processing attempts, retries included
    pub attempts: u64,
    pub records_emitted: u64,
    pub identity_failures: u64,
    pub geo_absent: u64,
    pub geo_fetch_failures: u64,
    pub sink_failures: u64,
    pub retries_scheduled: u64,
    /// Items dropped after exhausting their attempts
    pub items_abandoned: u64,
}

impl HarvestStats {
    /// Extraction failures of any kind
    pub fn extraction_failures(&self) -> u64 {
        self.identity_failures + self.geo_absent + self.geo_fetch_failures
    }

    /// Items that were settled without a record being stored
    pub fn items_failed(&self) -> u64 {
        self.identity_failures
            + self.geo_absent
            + self.sink_failures
            + (self.geo_fetch_failures - self.retries_scheduled.min(self.geo_fetch_failures))
    }
}

/// Statistics read back from the database
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    pub total_records: u64,
    pub total_runs: u64,
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &SqliteSink) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        total_records: storage.count_records()?,
        total_runs: storage.count_runs()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Geolocated photos stored: {}", stats.total_records);
    println!("  Runs recorded: {}", stats.total_runs);
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run (#{}):", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Seeds visited: {}", run.seeds_visited);
        println!("  Items discovered: {}", run.items_discovered);
        println!("  Records emitted: {}", run.records_emitted);
        println!("  Items failed: {}", run.items_failed);

        let yield_rate = if run.items_discovered > 0 {
            (run.records_emitted as f64 / run.items_discovered as f64) * 100.0
        } else {
            0.0
        };
        println!("  Geo yield: {:.1}%", yield_rate);
    }
}
