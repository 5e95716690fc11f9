use serde::Deserialize;
use std::time::Duration;

/// Default number of attempts per work item before it is abandoned
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Main configuration structure for Geo-Harvest
///
/// Built once at startup and handed to the coordinator, which shares the
/// relevant parts with the worker pool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Listing page URLs to discover photos from, in crawl order
    #[serde(default)]
    pub seeds: Vec<String>,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of concurrent workers (defaults to host parallelism)
    #[serde(rename = "worker-count", default)]
    pub worker_count: Option<usize>,

    /// Maximum processing attempts per work item
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Which failures put a work item back on the queue
    #[serde(rename = "retry-policy", default)]
    pub retry_policy: RetryPolicy,

    /// Total time allowed for a single request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Time allowed to establish a connection (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum queued entries before producers wait; 0 means unbounded
    #[serde(rename = "queue-capacity", default)]
    pub queue_capacity: usize,
}

impl CrawlerConfig {
    /// Resolves the worker count, falling back to the available parallelism
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Queue bound as an option, `None` when unbounded
    pub fn queue_bound(&self) -> Option<usize> {
        (self.queue_capacity > 0).then_some(self.queue_capacity)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_policy: RetryPolicy::default(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            queue_capacity: 0,
        }
    }
}

/// Decides whether a failed work item goes back on the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryPolicy {
    /// Failed items are logged and dropped
    Never,

    /// Items whose detail page could not be fetched are requeued
    /// until they reach `max-attempts`
    #[default]
    OnFetchFailure,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version`
    pub fn header_value(&self) -> String {
        format!("{}/{}", self.crawler_name, self.crawler_version)
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "GeoHarvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Site the detail pages are fetched from
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host used to build canonical photo URLs
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Logging configuration
///
/// Defaults to stderr at `info`. A per-crawler log file at full detail is
/// one setting away:
///
/// ```toml
/// [logging]
/// destination = "flickr.log"
/// level = "debug"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log file to append to; stderr when absent
    #[serde(default)]
    pub destination: Option<String>,

    /// Minimum level: trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            destination: None,
            level: default_log_level(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_base_url() -> String {
    "https://www.flickr.com".to_string()
}

fn default_database_path() -> String {
    "flickr.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
