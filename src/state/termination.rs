use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot signal that discovery is finished
///
/// Set once by the coordinator after the last seed; read by every worker
/// before each dequeue attempt. Once set it never clears.
#[derive(Debug, Default)]
pub struct TerminationFlag {
    done: AtomicBool,
}

impl TerminationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks discovery as finished. Repeated calls are no-ops.
    pub fn set(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}
