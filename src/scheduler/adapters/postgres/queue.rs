//! `PostgreSQL`-backed work queue.
//!
//! Each occurrence becomes one `work_queue` row keyed by its occurrence
//! identifier. Re-publishing an occurrence is a no-op, and executors consume
//! rows independently of the scheduler.

use super::{models::NewWorkQueueRow, schema::work_queue, store::SchedulerPgPool};
use crate::scheduler::{
    domain::Occurrence,
    ports::{WorkQueue, WorkQueueError, WorkQueueResult},
};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

/// Work queue stored in the scheduler database.
#[derive(Clone)]
pub struct PostgresWorkQueue {
    pool: SchedulerPgPool,
}

impl PostgresWorkQueue {
    /// Creates a queue from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: SchedulerPgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkQueue for PostgresWorkQueue {
    async fn publish(&self, occurrence: &Occurrence) -> WorkQueueResult<()> {
        let chain = serde_json::to_value(&occurrence.chain).map_err(|err| {
            WorkQueueError::Rejected {
                occurrence_id: occurrence.occurrence_id.clone(),
                reason: err.to_string(),
            }
        })?;
        let row = NewWorkQueueRow {
            occurrence_id: occurrence.occurrence_id.as_str().to_owned(),
            task_id: occurrence.task_id.into_inner(),
            chain,
            enqueued_at: Utc::now(),
        };
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(WorkQueueError::unavailable)?;
            diesel::insert_into(work_queue::table)
                .values(&row)
                .on_conflict(work_queue::occurrence_id)
                .do_nothing()
                .execute(&mut connection)
                .map_err(WorkQueueError::unavailable)?;
            Ok(())
        })
        .await
        .map_err(WorkQueueError::unavailable)?
    }
}
