//! Diesel row models for scheduler persistence.

use super::schema::{scheduled_tasks, work_queue};
use crate::scheduler::domain::TaskRecord;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for scheduled task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = scheduled_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Display label.
    pub task_name: String,
    /// Workflow JSON payload.
    pub workflow: Value,
    /// Schedule JSON payload.
    pub schedule: Value,
    /// Zone name.
    pub timezone: String,
    /// Whether the task is still evaluated.
    pub is_active: bool,
    /// Last confirmed dispatch instant.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<TaskRow> for TaskRecord {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.id,
            task_name: row.task_name,
            workflow: row.workflow,
            schedule: row.schedule,
            timezone: row.timezone,
            is_active: row.is_active,
            last_run_at: row.last_run_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Insert model for scheduled task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = scheduled_tasks)]
pub struct NewTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Display label.
    pub task_name: String,
    /// Workflow JSON payload.
    pub workflow: Value,
    /// Schedule JSON payload.
    pub schedule: Value,
    /// Zone name.
    pub timezone: String,
    /// Whether the task is still evaluated.
    pub is_active: bool,
    /// Last confirmed dispatch instant.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<TaskRecord> for NewTaskRow {
    fn from(record: TaskRecord) -> Self {
        Self {
            id: record.id,
            task_name: record.task_name,
            workflow: record.workflow,
            schedule: record.schedule,
            timezone: record.timezone,
            is_active: record.is_active,
            last_run_at: record.last_run_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Insert model for work queue entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = work_queue)]
pub struct NewWorkQueueRow {
    /// Unique occurrence identifier.
    pub occurrence_id: String,
    /// Task the chain belongs to.
    pub task_id: uuid::Uuid,
    /// Ordered work items.
    pub chain: Value,
    /// Enqueue timestamp.
    pub enqueued_at: DateTime<Utc>,
}
