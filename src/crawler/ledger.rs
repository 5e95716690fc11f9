//! Per-item attempt bookkeeping
//!
//! The ledger is the single source of truth for how many times a work item
//! has been processed in the current run. Counts only ever go up.

use crate::state::WorkItem;
use std::collections::HashMap;
use std::sync::Mutex;

/// Maps `item_id` to the number of processing attempts
#[derive(Debug, Default)]
pub struct RetryLedger {
    attempts: Mutex<HashMap<String, u32>>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one more attempt for `item` and returns the new count
    pub fn record_attempt(&self, item: &WorkItem) -> u32 {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = attempts.entry(item.item_id.clone()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Number of attempts recorded for `item` (0 if never attempted)
    pub fn attempt_count(&self, item: &WorkItem) -> u32 {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&item.item_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of distinct items attempted
    pub fn len(&self) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
