//! Storage module for persisting harvest results
//!
//! This module handles:
//! - The `RecordSink` seam the worker pool writes records through
//! - SQLite persistence of geolocated photos (`flickr_meta`)
//! - Run tracking for statistics

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteSink;
pub use traits::{FnSink, MemorySink, RecordSink, StorageError, StorageResult};

use std::path::Path;

/// Opens or creates the record database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteSink)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteSink> {
    SqliteSink::new(path)
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub seeds_visited: u64,
    pub items_discovered: u64,
    pub records_emitted: u64,
    pub items_failed: u64,
}

/// Counters written to a run row when it finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub seeds_visited: u64,
    pub items_discovered: u64,
    pub records_emitted: u64,
    pub items_failed: u64,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_parses_known_values() {
        assert_eq!(RunStatus::from_db_string("completed"), Some(RunStatus::Completed));
        assert_eq!(
            RunStatus::from_db_string(RunStatus::Interrupted.to_db_string()),
            Some(RunStatus::Interrupted)
        );
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }
}
