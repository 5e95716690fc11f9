//! Crawler module for discovery and concurrent extraction
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with bounded timeouts
//! - Listing and detail page extraction behind the `Site` trait
//! - The shared job queue and retry bookkeeping
//! - The worker pool and its termination protocol
//! - Overall run coordination

mod coordinator;
mod extractor;
mod fetcher;
mod ledger;
mod pool;
mod queue;

#[cfg(test)]
mod testing;

pub use coordinator::{Coordinator, CrawlSummary};
pub use extractor::{DiscoveryParseError, ExtractError, FlickrSite, GeoLookup, Site};
pub use fetcher::{build_http_client, FetchError, FetchErrorKind, Fetcher, HttpFetcher, PageContent};
pub use ledger::RetryLedger;
pub use pool::{harvest_item, PoolHandle, PoolReport, RetryOptions, WorkerPool, WorkerReport};
pub use queue::{JobQueue, QueueClosed, QueueEntry};

