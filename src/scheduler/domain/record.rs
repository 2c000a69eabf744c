//! Persisted document layout of a task row.
//!
//! Schedule, workflow, and zone are kept as raw documents so that one
//! unreadable row surfaces as a [`MalformedTask`] instead of failing a whole
//! fetch.

use super::{MalformedTask, PersistedTaskData, ScheduledTask, TaskId, TaskTimezone};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Storage-shaped task record.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    /// Task identifier.
    pub id: Uuid,
    /// Display label.
    pub task_name: String,
    /// Ordered list of `{tool, parameters}` documents.
    pub workflow: Value,
    /// Discriminated `{type, value}` schedule document.
    pub schedule: Value,
    /// Zone name.
    pub timezone: String,
    /// Whether the task is still evaluated.
    pub is_active: bool,
    /// Instant of the last confirmed dispatch.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Encodes a task into its storage layout.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when a document cannot be encoded.
    pub fn from_task(task: &ScheduledTask) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: task.id().into_inner(),
            task_name: task.task_name().to_owned(),
            workflow: serde_json::to_value(task.workflow())?,
            schedule: serde_json::to_value(task.schedule())?,
            timezone: task.timezone().name().to_owned(),
            is_active: task.is_active(),
            last_run_at: task.last_run_at(),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
        })
    }
}

impl TryFrom<TaskRecord> for ScheduledTask {
    type Error = MalformedTask;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let TaskRecord {
            id,
            task_name,
            workflow,
            schedule,
            timezone,
            is_active,
            last_run_at,
            created_at,
            updated_at,
        } = record;
        let task_id = TaskId::from_uuid(id);
        let schedule_type = schedule
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let malformed = |field: &'static str, reason: String| MalformedTask {
            task_id,
            schedule_type: schedule_type.clone(),
            field,
            reason,
        };

        let schedule =
            serde_json::from_value(schedule).map_err(|err| malformed("schedule", err.to_string()))?;
        let workflow =
            serde_json::from_value(workflow).map_err(|err| malformed("workflow", err.to_string()))?;
        let timezone =
            TaskTimezone::parse(&timezone).map_err(|err| malformed("timezone", err.to_string()))?;

        Ok(Self::from_persisted(PersistedTaskData {
            id: task_id,
            task_name,
            workflow,
            schedule,
            timezone,
            is_active,
            last_run_at,
            created_at,
            updated_at,
        }))
    }
}
