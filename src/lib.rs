//! Geo-Harvest: a concurrent photo geolocation harvester
//!
//! This crate fetches a bounded set of listing pages, discovers the photos
//! embedded in them, and hands each photo to a pool of concurrent workers
//! that fetch its detail page and extract coordinates. Completed records
//! are delivered to a pluggable sink.

pub mod config;
pub mod crawler;
pub mod logging;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Geo-Harvest operations
///
/// Only startup failures surface through this type. Failures tied to a
/// single seed or work item are logged and recovered inside the crawler.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Geo-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlSummary};
pub use state::{GeoPoint, Record, WorkItem, WorkerState};
pub use storage::{RecordSink, SqliteSink};
