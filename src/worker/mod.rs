//! The batch queue and its sequential worker.
//!
//! - [`BatchQueue`]: admission, control API and observation
//! - the worker loop visits pending items in submission order, one at a time

mod error;
mod queue;
mod runner;

pub use error::{QueueError, QueueResult};
pub use queue::{Admission, BatchQueue, Rejection};
