//! Worker lifecycle states

use std::fmt;

/// State of a single pool worker
///
/// A worker starts `Running`, enters `Draining` while it owns a popped work
/// item, and returns to `Running` once the item is settled. `Stopped` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Waiting on the queue for the next entry
    Running,

    /// Processing a popped work item
    Draining,

    /// Exited; will never pop again
    Stopped,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Draining)
                | (Self::Running, Self::Stopped)
                | (Self::Draining, Self::Running)
                | (Self::Draining, Self::Stopped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
