//! In-memory work queue recording published occurrences.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use crate::scheduler::{
    domain::{Occurrence, TaskId},
    ports::{WorkQueue, WorkQueueError, WorkQueueResult},
};

/// In-memory work queue.
///
/// Publishing appends to an ordered log. Individual tasks can be set to fail
/// so dispatch-phase error isolation can be exercised deterministically.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkQueue {
    state: Arc<RwLock<InMemoryQueueState>>,
}

#[derive(Debug, Default)]
struct InMemoryQueueState {
    published: Vec<Occurrence>,
    rejecting: HashSet<TaskId>,
}

impl InMemoryWorkQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later publish for `task_id` fail.
    ///
    /// # Errors
    ///
    /// Returns queue errors when lock acquisition fails.
    pub fn reject_task(&self, task_id: TaskId) -> WorkQueueResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| WorkQueueError::unavailable(std::io::Error::other(err.to_string())))?;
        state.rejecting.insert(task_id);
        Ok(())
    }

    /// Returns every accepted occurrence in publish order.
    ///
    /// # Errors
    ///
    /// Returns queue errors when lock acquisition fails.
    pub fn published(&self) -> WorkQueueResult<Vec<Occurrence>> {
        let state = self
            .state
            .read()
            .map_err(|err| WorkQueueError::unavailable(std::io::Error::other(err.to_string())))?;
        Ok(state.published.clone())
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn publish(&self, occurrence: &Occurrence) -> WorkQueueResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| WorkQueueError::unavailable(std::io::Error::other(err.to_string())))?;

        if state.rejecting.contains(&occurrence.task_id) {
            return Err(WorkQueueError::Rejected {
                occurrence_id: occurrence.occurrence_id.clone(),
                reason: "queue configured to reject this task".to_owned(),
            });
        }

        state.published.push(occurrence.clone());
        Ok(())
    }
}
