//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `WorkItem`: a photo reference discovered on a listing page
//! - `Record`: the geolocated result of processing one work item
//! - `WorkerState`: lifecycle of a single pool worker
//! - `TerminationFlag`: one-shot signal that discovery is finished

mod termination;
mod work_item;
mod worker_state;

// Re-export main types
pub use termination::TerminationFlag;
pub use work_item::{GeoPoint, Record, WorkItem};
pub use worker_state::WorkerState;
