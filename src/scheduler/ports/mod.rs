//! Port contracts for scheduling.
//!
//! Ports define infrastructure-agnostic interfaces used by scheduler services.

pub mod queue;
pub mod store;

pub use queue::{WorkQueue, WorkQueueError, WorkQueueResult};
pub use store::{EvaluationTransaction, FetchedTask, TaskStore, TaskStoreError, TaskStoreResult};
