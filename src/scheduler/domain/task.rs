//! Scheduled task aggregate root and the state changes a firing implies.

use super::{Schedule, TaskId, TaskTimezone, Workflow};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// State change decided by schedule evaluation for a due task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskMutation {
    /// Interval task fired: record the run instant.
    RecordRun {
        /// Evaluation instant the task fired at.
        at: DateTime<Utc>,
    },
    /// One-shot task fired: never evaluate it again.
    Deactivate,
}

/// Durable unit of schedulable work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    id: TaskId,
    task_name: String,
    workflow: Workflow,
    schedule: Schedule,
    timezone: TaskTimezone,
    is_active: bool,
    last_run_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Display label.
    pub task_name: String,
    /// Ordered steps.
    pub workflow: Workflow,
    /// Decoded schedule.
    pub schedule: Schedule,
    /// Zone the schedule is evaluated in.
    pub timezone: TaskTimezone,
    /// Whether the task is still evaluated.
    pub is_active: bool,
    /// Instant of the last confirmed dispatch.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ScheduledTask {
    /// Creates a new active task that has never run.
    #[must_use]
    pub fn new(
        task_name: impl Into<String>,
        workflow: Workflow,
        schedule: Schedule,
        timezone: TaskTimezone,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            task_name: task_name.into(),
            workflow,
            schedule,
            timezone,
            is_active: true,
            last_run_at: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            task_name: data.task_name,
            workflow: data.workflow,
            schedule: data.schedule,
            timezone: data.timezone,
            is_active: data.is_active,
            last_run_at: data.last_run_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the display label.
    #[must_use]
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Returns the ordered workflow.
    #[must_use]
    pub const fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Returns the schedule.
    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Returns the zone the schedule is evaluated in.
    #[must_use]
    pub const fn timezone(&self) -> TaskTimezone {
        self.timezone
    }

    /// Returns whether the task is still evaluated.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the instant of the last confirmed dispatch.
    #[must_use]
    pub const fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies an evaluation-decided mutation.
    ///
    /// `last_run_at` never moves backwards, and deactivation is permanent.
    pub fn apply(&mut self, mutation: TaskMutation, clock: &impl Clock) {
        match mutation {
            TaskMutation::RecordRun { at } => {
                self.last_run_at = Some(self.last_run_at.map_or(at, |previous| previous.max(at)));
            }
            TaskMutation::Deactivate => self.is_active = false,
        }
        self.updated_at = clock.utc();
    }
}
