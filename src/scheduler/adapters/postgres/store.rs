//! `PostgreSQL` task store.
//!
//! Evaluation transactions hold a pooled connection with an open
//! transaction. Rows are locked with `SELECT ... FOR UPDATE`, so a second
//! scheduler process blocks on the same rows until the first commits and
//! then reads the committed state.

use super::{
    models::{NewTaskRow, TaskRow},
    schema::scheduled_tasks,
};
use crate::scheduler::{
    domain::{ScheduledTask, TaskId, TaskMutation, TaskRecord},
    ports::{EvaluationTransaction, FetchedTask, TaskStore, TaskStoreError, TaskStoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Array, Bool, Nullable, Timestamptz};
use std::collections::BTreeMap;

/// `PostgreSQL` connection pool type used by scheduler adapters.
pub type SchedulerPgPool = Pool<ConnectionManager<PgConnection>>;

type PooledConn = PooledConnection<ConnectionManager<PgConnection>>;

/// Writes every pending mutation in one statement. `GREATEST` ignores
/// `NULL`, which keeps `last_run_at` monotonic.
const APPLY_MUTATIONS_SQL: &str = concat!(
    "UPDATE scheduled_tasks AS t SET ",
    "last_run_at = GREATEST(t.last_run_at, m.last_run_at), ",
    "is_active = t.is_active AND NOT m.deactivate, ",
    "updated_at = now() ",
    "FROM UNNEST($1::uuid[], $2::timestamptz[], $3::bool[]) ",
    "AS m(id, last_run_at, deactivate) ",
    "WHERE t.id = m.id",
);

/// `PostgreSQL`-backed task store.
#[derive(Clone)]
pub struct PostgresTaskStore {
    pool: SchedulerPgPool,
}

impl PostgresTaskStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: SchedulerPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskStoreError::persistence)?
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    type Transaction = PostgresEvaluationTransaction;

    fn begin_evaluation(&self) -> TaskStoreResult<Self::Transaction> {
        let mut connection = self.pool.get().map_err(TaskStoreError::persistence)?;
        AnsiTransactionManager::begin_transaction(&mut *connection)
            .map_err(TaskStoreError::persistence)?;
        Ok(PostgresEvaluationTransaction {
            connection,
            snapshots: BTreeMap::new(),
            pending: BTreeMap::new(),
            open: true,
        })
    }

    async fn insert(&self, task: &ScheduledTask) -> TaskStoreResult<()> {
        let task_id = task.id();
        let new_row = NewTaskRow::from(
            TaskRecord::from_task(task).map_err(TaskStoreError::persistence)?,
        );

        self.run_blocking(move |connection| {
            diesel::insert_into(scheduled_tasks::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskStoreError::DuplicateTask(task_id)
                    }
                    _ => TaskStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<FetchedTask>> {
        self.run_blocking(move |connection| {
            let row = scheduled_tasks::table
                .filter(scheduled_tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskStoreError::persistence)?;
            Ok(row.map(row_to_task))
        })
        .await
    }

    async fn list(&self, offset: usize, limit: usize) -> TaskStoreResult<Vec<FetchedTask>> {
        let offset = i64::try_from(offset).map_err(TaskStoreError::persistence)?;
        let limit = i64::try_from(limit).map_err(TaskStoreError::persistence)?;
        self.run_blocking(move |connection| {
            let rows = scheduled_tasks::table
                .order((scheduled_tasks::created_at.asc(), scheduled_tasks::id.asc()))
                .offset(offset)
                .limit(limit)
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskStoreError::persistence)?;
            Ok(rows.into_iter().map(row_to_task).collect())
        })
        .await
    }
}

/// Net effect of every mutation applied to one task in a transaction.
#[derive(Debug, Clone, Copy, Default)]
struct PendingChange {
    last_run_at: Option<DateTime<Utc>>,
    deactivate: bool,
}

impl PendingChange {
    fn merge(&mut self, mutation: TaskMutation) {
        match mutation {
            TaskMutation::RecordRun { at } => {
                self.last_run_at = Some(self.last_run_at.map_or(at, |previous| previous.max(at)));
            }
            TaskMutation::Deactivate => self.deactivate = true,
        }
    }
}

/// Evaluation transaction on a dedicated pooled connection.
pub struct PostgresEvaluationTransaction {
    connection: PooledConn,
    snapshots: BTreeMap<TaskId, ScheduledTask>,
    pending: BTreeMap<TaskId, PendingChange>,
    open: bool,
}

impl PostgresEvaluationTransaction {
    fn write_pending(&mut self) -> TaskStoreResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut ids = Vec::with_capacity(self.pending.len());
        let mut run_times = Vec::with_capacity(self.pending.len());
        let mut deactivations = Vec::with_capacity(self.pending.len());
        for (task_id, change) in &self.pending {
            ids.push(task_id.into_inner());
            run_times.push(change.last_run_at);
            deactivations.push(change.deactivate);
        }

        diesel::sql_query(APPLY_MUTATIONS_SQL)
            .bind::<Array<diesel::sql_types::Uuid>, _>(ids)
            .bind::<Array<Nullable<Timestamptz>>, _>(run_times)
            .bind::<Array<Bool>, _>(deactivations)
            .execute(&mut *self.connection)
            .map_err(TaskStoreError::persistence)?;
        Ok(())
    }

    fn finish_with_rollback(&mut self) -> TaskStoreResult<()> {
        self.open = false;
        AnsiTransactionManager::rollback_transaction(&mut *self.connection)
            .map_err(TaskStoreError::persistence)
    }
}

impl EvaluationTransaction for PostgresEvaluationTransaction {
    fn fetch_active_for_evaluation(&mut self) -> TaskStoreResult<Vec<FetchedTask>> {
        let rows = scheduled_tasks::table
            .filter(scheduled_tasks::is_active.eq(true))
            .order((scheduled_tasks::created_at.asc(), scheduled_tasks::id.asc()))
            .select(TaskRow::as_select())
            .for_update()
            .load::<TaskRow>(&mut *self.connection)
            .map_err(TaskStoreError::persistence)?;

        let fetched: Vec<FetchedTask> = rows.into_iter().map(row_to_task).collect();
        for task in fetched.iter().flatten() {
            self.snapshots.insert(task.id(), task.clone());
        }
        Ok(fetched)
    }

    fn apply_mutation(&mut self, task_id: TaskId, mutation: TaskMutation) -> TaskStoreResult<()> {
        if !self.snapshots.contains_key(&task_id) {
            return Err(TaskStoreError::NotLocked(task_id));
        }
        self.pending.entry(task_id).or_default().merge(mutation);
        Ok(())
    }

    fn snapshot(&self, task_id: TaskId) -> Option<&ScheduledTask> {
        self.snapshots.get(&task_id)
    }

    fn commit(mut self) -> TaskStoreResult<()> {
        if let Err(err) = self.write_pending() {
            if let Err(rollback_err) = self.finish_with_rollback() {
                tracing::warn!(error = %rollback_err, "rollback after failed write also failed");
            }
            return Err(err);
        }
        self.open = false;
        AnsiTransactionManager::commit_transaction(&mut *self.connection)
            .map_err(TaskStoreError::persistence)
    }

    fn rollback(mut self) -> TaskStoreResult<()> {
        self.finish_with_rollback()
    }
}

impl Drop for PostgresEvaluationTransaction {
    fn drop(&mut self) {
        if self.open
            && let Err(err) = self.finish_with_rollback()
        {
            tracing::warn!(error = %err, "failed to roll back abandoned evaluation transaction");
        }
    }
}

fn row_to_task(row: TaskRow) -> FetchedTask {
    ScheduledTask::try_from(TaskRecord::from(row))
}

#[cfg(test)]
mod tests {
    use super::PendingChange;
    use crate::scheduler::domain::TaskMutation;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    #[rstest]
    fn pending_change_keeps_the_latest_run_and_sticky_deactivation() {
        let earlier = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).single().expect("instant");
        let later = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).single().expect("instant");
        let mut change = PendingChange::default();

        change.merge(TaskMutation::RecordRun { at: later });
        change.merge(TaskMutation::Deactivate);
        change.merge(TaskMutation::RecordRun { at: earlier });

        assert_eq!(change.last_run_at, Some(later));
        assert!(change.deactivate);
    }
}
