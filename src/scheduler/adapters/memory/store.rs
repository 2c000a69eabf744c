//! In-memory task store for scheduler tests and local runs.
//!
//! A single async mutex stands in for row locks: an open evaluation
//! transaction owns the guard, so a second transaction blocks until the
//! first commits, rolls back, or is dropped.

use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::scheduler::{
    domain::{ScheduledTask, TaskId, TaskMutation, TaskRecord},
    ports::{EvaluationTransaction, FetchedTask, TaskStore, TaskStoreError, TaskStoreResult},
};

/// Thread-safe in-memory task store.
pub struct InMemoryTaskStore<C = DefaultClock> {
    state: Arc<Mutex<InMemoryTaskState>>,
    clock: Arc<C>,
}

impl<C> Clone for InMemoryTaskStore<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    records: Vec<TaskRecord>,
}

impl InMemoryTaskState {
    fn position(&self, id: TaskId) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.id == id.into_inner())
    }
}

impl InMemoryTaskStore<DefaultClock> {
    /// Creates an empty store stamping updates with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl Default for InMemoryTaskStore<DefaultClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryTaskStore<C>
where
    C: Clock + Send + Sync + 'static,
{
    /// Creates an empty store stamping updates with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryTaskState::default())),
            clock,
        }
    }

    /// Stores a raw record as-is, bypassing domain encoding.
    ///
    /// Lets callers seed rows whose documents do not decode.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateTask`] when the identifier exists.
    pub async fn insert_record(&self, record: TaskRecord) -> TaskStoreResult<()> {
        let mut state = self.state.lock().await;
        let task_id = TaskId::from_uuid(record.id);
        if state.position(task_id).is_some() {
            return Err(TaskStoreError::DuplicateTask(task_id));
        }
        state.records.push(record);
        Ok(())
    }
}

#[async_trait]
impl<C> TaskStore for InMemoryTaskStore<C>
where
    C: Clock + Send + Sync + 'static,
{
    type Transaction = InMemoryEvaluationTransaction<C>;

    fn begin_evaluation(&self) -> TaskStoreResult<Self::Transaction> {
        let guard = Arc::clone(&self.state).blocking_lock_owned();
        Ok(InMemoryEvaluationTransaction {
            guard,
            clock: Arc::clone(&self.clock),
            snapshots: HashMap::new(),
            working: HashMap::new(),
            pending: Vec::new(),
        })
    }

    async fn insert(&self, task: &ScheduledTask) -> TaskStoreResult<()> {
        let record = TaskRecord::from_task(task).map_err(TaskStoreError::persistence)?;
        self.insert_record(record).await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<FetchedTask>> {
        let state = self.state.lock().await;
        Ok(state
            .position(id)
            .and_then(|index| state.records.get(index))
            .cloned()
            .map(ScheduledTask::try_from))
    }

    async fn list(&self, offset: usize, limit: usize) -> TaskStoreResult<Vec<FetchedTask>> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .map(ScheduledTask::try_from)
            .collect())
    }
}

/// Evaluation transaction over the in-memory store.
pub struct InMemoryEvaluationTransaction<C> {
    guard: OwnedMutexGuard<InMemoryTaskState>,
    clock: Arc<C>,
    snapshots: HashMap<TaskId, ScheduledTask>,
    working: HashMap<TaskId, ScheduledTask>,
    pending: Vec<TaskId>,
}

impl<C> EvaluationTransaction for InMemoryEvaluationTransaction<C>
where
    C: Clock + Send + Sync + 'static,
{
    fn fetch_active_for_evaluation(&mut self) -> TaskStoreResult<Vec<FetchedTask>> {
        let fetched: Vec<FetchedTask> = self
            .guard
            .records
            .iter()
            .filter(|record| record.is_active)
            .cloned()
            .map(ScheduledTask::try_from)
            .collect();

        for task in fetched.iter().flatten() {
            self.snapshots.insert(task.id(), task.clone());
        }
        Ok(fetched)
    }

    fn apply_mutation(&mut self, task_id: TaskId, mutation: TaskMutation) -> TaskStoreResult<()> {
        let snapshot = self
            .snapshots
            .get(&task_id)
            .ok_or(TaskStoreError::NotLocked(task_id))?;
        let task = self
            .working
            .entry(task_id)
            .or_insert_with(|| snapshot.clone());
        task.apply(mutation, &*self.clock);
        if !self.pending.contains(&task_id) {
            self.pending.push(task_id);
        }
        Ok(())
    }

    fn snapshot(&self, task_id: TaskId) -> Option<&ScheduledTask> {
        self.snapshots.get(&task_id)
    }

    fn commit(mut self) -> TaskStoreResult<()> {
        let updates = self
            .pending
            .iter()
            .map(|task_id| {
                match (self.working.get(task_id), self.guard.position(*task_id)) {
                    (Some(task), Some(index)) => Ok((index, task)),
                    _ => Err(TaskStoreError::NotLocked(*task_id)),
                }
            })
            .collect::<TaskStoreResult<Vec<_>>>()?;

        let records = &mut self.guard.records;
        for (index, task) in updates {
            if let Some(record) = records.get_mut(index) {
                record.is_active = task.is_active();
                record.last_run_at = task.last_run_at();
                record.updated_at = task.updated_at();
            }
        }
        Ok(())
    }

    fn rollback(self) -> TaskStoreResult<()> {
        Ok(())
    }
}
