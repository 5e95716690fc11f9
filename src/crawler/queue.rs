//! Shared job queue between the coordinator and the workers
//!
//! A FIFO of `QueueEntry` values guarded by a mutex, with `Notify` handles
//! so that consumers wait instead of spinning. The terminal marker is its
//! own variant and can never collide with a real work item.
//!
//! The queue may be bounded. Producers (`push`) then wait for space, while
//! `requeue` always succeeds: it is used by workers, which are the only
//! consumers, so letting it wait could stall the pool.

use crate::state::WorkItem;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// An entry on the job queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEntry {
    /// A work item waiting to be processed
    Job(WorkItem),

    /// End-of-work marker ("poison pill")
    Terminal,
}

/// Returned when pushing onto a queue that has been shut down
#[derive(Debug, Error)]
#[error("job queue is shut down")]
pub struct QueueClosed(pub QueueEntry);

/// Multi-producer, multi-consumer FIFO of queue entries
#[derive(Debug)]
pub struct JobQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    capacity: Option<usize>,
    available: Notify,
    space: Notify,
    shutdown: CancellationToken,
}

impl JobQueue {
    /// Creates a queue that shuts down when `shutdown` is cancelled
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum entries before `push` waits; `None` for unbounded
    /// * `shutdown` - Token that makes `pop` return `None` immediately
    pub fn new(capacity: Option<usize>, shutdown: CancellationToken) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.filter(|c| *c > 0),
            available: Notify::new(),
            space: Notify::new(),
            shutdown,
        }
    }

    /// Unbounded queue with its own shutdown token
    pub fn unbounded() -> Self {
        Self::new(None, CancellationToken::new())
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<QueueEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends an entry, waiting for space if the queue is bounded and full
    pub async fn push(&self, entry: QueueEntry) -> Result<(), QueueClosed> {
        let mut entry = entry;
        loop {
            if self.shutdown.is_cancelled() {
                return Err(QueueClosed(entry));
            }

            let space = self.space.notified();
            tokio::pin!(space);
            space.as_mut().enable();

            entry = match self.try_push(entry) {
                Ok(()) => return Ok(()),
                Err(entry) => entry,
            };

            tokio::select! {
                _ = &mut space => {}
                _ = self.shutdown.cancelled() => return Err(QueueClosed(entry)),
            }
        }
    }

    fn try_push(&self, entry: QueueEntry) -> Result<(), QueueEntry> {
        {
            let mut entries = self.lock();
            if let Some(capacity) = self.capacity {
                if entries.len() >= capacity {
                    return Err(entry);
                }
            }
            entries.push_back(entry);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Appends an entry regardless of capacity
    ///
    /// Used by workers to put back retried items and the terminal marker.
    pub fn requeue(&self, entry: QueueEntry) -> Result<(), QueueClosed> {
        if self.shutdown.is_cancelled() {
            return Err(QueueClosed(entry));
        }
        self.lock().push_back(entry);
        self.available.notify_one();
        Ok(())
    }

    /// Removes the oldest entry, waiting until one is available
    ///
    /// Returns `None` as soon as the queue is shut down, even if entries
    /// remain.
    pub async fn pop(&self) -> Option<QueueEntry> {
        loop {
            if self.shutdown.is_cancelled() {
                return None;
            }

            let available = self.available.notified();
            tokio::pin!(available);
            available.as_mut().enable();

            if let Some(entry) = self.try_pop() {
                return Some(entry);
            }

            tokio::select! {
                _ = &mut available => {}
                _ = self.shutdown.cancelled() => return None,
            }
        }
    }

    /// Removes the oldest entry without waiting
    pub fn try_pop(&self) -> Option<QueueEntry> {
        let entry = self.lock().pop_front();
        if entry.is_some() {
            self.space.notify_one();
        }
        entry
    }

    /// Best-effort emptiness check; may be stale by the time it returns
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Shuts the queue down, waking every waiting producer and consumer
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}
