//! Task Store Gateway port: transactional access to the task table.

use crate::scheduler::domain::{MalformedTask, ScheduledTask, TaskId, TaskMutation};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// A locked row: either a decodable task or a report of why it is not.
pub type FetchedTask = Result<ScheduledTask, MalformedTask>;

/// One evaluation transaction holding exclusive row locks.
///
/// All methods block the calling thread; run them off the async executor.
/// Dropping a transaction without committing rolls it back.
pub trait EvaluationTransaction: Send {
    /// Returns every active task, locking each returned row until the
    /// transaction ends. A concurrent transaction's fetch waits for this one.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] on lock timeout or connection failure.
    fn fetch_active_for_evaluation(&mut self) -> TaskStoreResult<Vec<FetchedTask>>;

    /// Records a mutation for a locked task. Nothing is persisted until
    /// [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotLocked`] when the task was not fetched in
    /// this transaction.
    fn apply_mutation(&mut self, task_id: TaskId, mutation: TaskMutation) -> TaskStoreResult<()>;

    /// Returns the task as fetched, ignoring mutations applied since.
    fn snapshot(&self, task_id: TaskId) -> Option<&ScheduledTask>;

    /// Persists all pending mutations atomically and releases the locks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the write or commit fails; nothing is
    /// persisted in that case.
    fn commit(self) -> TaskStoreResult<()>
    where
        Self: Sized;

    /// Discards all pending mutations and releases the locks.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when the store reports a rollback failure.
    fn rollback(self) -> TaskStoreResult<()>
    where
        Self: Sized;
}

/// Task persistence contract.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Transaction type produced by [`begin_evaluation`](Self::begin_evaluation).
    type Transaction: EvaluationTransaction + 'static;

    /// Opens an evaluation transaction. Blocks the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError`] when no connection or transaction can be
    /// obtained.
    fn begin_evaluation(&self) -> TaskStoreResult<Self::Transaction>;

    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateTask`] when the identifier exists.
    async fn insert(&self, task: &ScheduledTask) -> TaskStoreResult<()>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<FetchedTask>>;

    /// Lists tasks in creation order, skipping `offset` and returning at most
    /// `limit`.
    async fn list(&self, offset: usize, limit: usize) -> TaskStoreResult<Vec<FetchedTask>>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// A mutation targeted a task this transaction does not hold.
    #[error("task {0} is not locked by this transaction")]
    NotLocked(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    #[must_use]
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
