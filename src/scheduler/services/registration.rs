//! Creating and listing scheduled tasks.

use crate::scheduler::{
    domain::{
        CronMatcher, Schedule, ScheduleError, ScheduledTask, TaskDomainError, TaskId, TaskTimezone,
        Workflow,
    },
    ports::{FetchedTask, TaskStore, TaskStoreError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Request payload for registering a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterTaskRequest {
    task_name: String,
    workflow: Workflow,
    schedule: Schedule,
    timezone: String,
}

impl RegisterTaskRequest {
    /// Creates a request evaluated in UTC.
    #[must_use]
    pub fn new(task_name: impl Into<String>, workflow: Workflow, schedule: Schedule) -> Self {
        Self {
            task_name: task_name.into(),
            workflow,
            schedule,
            timezone: "UTC".to_owned(),
        }
    }

    /// Sets the zone the schedule is interpreted in. Accepts IANA names and
    /// common abbreviations.
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}

/// Service-level errors for task registration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Input validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// The schedule could never be evaluated.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Result type for registration operations.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// Registers tasks and pages through them.
pub struct TaskRegistrationService<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> TaskRegistrationService<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    /// Creates a new registration service.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Validates and stores a new active task.
    ///
    /// Cron expressions are compiled and one-shot times resolved up front so
    /// that a stored task is always evaluable.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the zone, schedule, or store
    /// rejects the request.
    pub async fn create_task(
        &self,
        request: RegisterTaskRequest,
    ) -> RegistrationResult<ScheduledTask> {
        let timezone = TaskTimezone::parse(&request.timezone)?;
        validate_schedule(&request.schedule, timezone)?;

        let task = ScheduledTask::new(
            request.task_name,
            request.workflow,
            request.schedule,
            timezone,
            &*self.clock,
        );
        self.store.insert(&task).await?;
        Ok(task)
    }

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Store`] when the lookup fails.
    pub async fn find_task(&self, task_id: TaskId) -> RegistrationResult<Option<FetchedTask>> {
        Ok(self.store.find_by_id(task_id).await?)
    }

    /// Returns one page of tasks, oldest first. Unreadable rows are
    /// returned as errors in place.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Store`] when the lookup fails.
    pub async fn list_tasks(
        &self,
        offset: usize,
        limit: usize,
    ) -> RegistrationResult<Vec<FetchedTask>> {
        Ok(self.store.list(offset, limit).await?)
    }
}

fn validate_schedule(schedule: &Schedule, timezone: TaskTimezone) -> Result<(), ScheduleError> {
    match schedule {
        Schedule::Cron(fields) => CronMatcher::compile(fields).map(|_| ()),
        Schedule::Interval { every, .. } if *every == 0 => {
            Err(ScheduleError::NonPositiveInterval(*every))
        }
        Schedule::Interval { .. } => Ok(()),
        Schedule::DateTime { instant } => timezone
            .localize(*instant)
            .map(|_| ())
            .ok_or_else(|| ScheduleError::UnresolvableLocalTime {
                local: instant.to_string(),
                timezone: timezone.name().to_owned(),
            }),
    }
}
