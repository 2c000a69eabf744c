//! Queue Publisher port: hands work chains to the external work queue.

use crate::scheduler::domain::{Occurrence, OccurrenceId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for work queue operations.
pub type WorkQueueResult<T> = Result<T, WorkQueueError>;

/// At-least-once delivery channel for work chains.
///
/// Steps of one occurrence run in chain order on the executor side.
/// Publishing the same occurrence twice is allowed; consumers key on the
/// occurrence identifier.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueues an occurrence for asynchronous execution.
    ///
    /// # Errors
    ///
    /// Returns [`WorkQueueError`] when the queue refuses or cannot be reached.
    async fn publish(&self, occurrence: &Occurrence) -> WorkQueueResult<()>;
}

/// Errors returned by work queue implementations.
#[derive(Debug, Clone, Error)]
pub enum WorkQueueError {
    /// The queue refused the occurrence.
    #[error("occurrence {occurrence_id} rejected: {reason}")]
    Rejected {
        /// Rejected occurrence.
        occurrence_id: OccurrenceId,
        /// Reason reported by the queue.
        reason: String,
    },

    /// The queue could not be reached or failed internally.
    #[error("work queue unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl WorkQueueError {
    /// Wraps a transport error.
    #[must_use]
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
