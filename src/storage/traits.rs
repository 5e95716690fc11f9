//! Storage traits and error types
//!
//! `RecordSink` is the seam between the worker pool and whatever consumes
//! finished records. The pool only ever holds an `Arc<dyn RecordSink>`.

use crate::state::Record;
use std::sync::Mutex;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Receives every completed record
///
/// Called concurrently from several workers, in no particular order.
/// Implementations serialize their own writes. An error is logged and
/// counted by the caller; it never stops the crawl.
pub trait RecordSink: Send + Sync {
    fn on_record(&self, record: Record) -> StorageResult<()>;
}

/// Adapts a closure into a `RecordSink`
///
/// ```
/// use geo_harvest::storage::{FnSink, RecordSink};
///
/// let sink = FnSink::new(|record: geo_harvest::Record| println!("{}", record.url));
/// # let _ = &sink as &dyn RecordSink;
/// ```
pub struct FnSink<F> {
    callback: F,
}

impl<F> FnSink<F>
where
    F: Fn(Record) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> RecordSink for FnSink<F>
where
    F: Fn(Record) + Send + Sync,
{
    fn on_record(&self, record: Record) -> StorageResult<()> {
        (self.callback)(record);
        Ok(())
    }
}

/// Keeps records in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything received so far
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn on_record(&self, record: Record) -> StorageResult<()> {
        self.records
            .lock()
            .map_err(|_| StorageError::Poisoned)?
            .push(record);
        Ok(())
    }
}
