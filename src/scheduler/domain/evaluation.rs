//! Schedule evaluation: decides whether a task is due and what firing implies.
//!
//! Every function here is pure. The caller supplies `now` and the polling
//! window, so results depend only on the arguments.

use super::{
    CronFields, CronMatcher, IntervalPeriod, Schedule, ScheduleError, ScheduledTask, TaskMutation,
    TaskTimezone,
};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Outcome of evaluating one task at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    due: bool,
    mutation: Option<TaskMutation>,
}

impl Evaluation {
    /// The task is not due; nothing changes.
    pub const NOT_DUE: Self = Self {
        due: false,
        mutation: None,
    };

    /// The task is due and firing implies `mutation`.
    #[must_use]
    pub const fn due(mutation: Option<TaskMutation>) -> Self {
        Self {
            due: true,
            mutation,
        }
    }

    /// Returns whether the task should fire now.
    #[must_use]
    pub const fn is_due(&self) -> bool {
        self.due
    }

    /// Returns the state change that accompanies the firing, if any.
    #[must_use]
    pub const fn mutation(&self) -> Option<TaskMutation> {
        self.mutation
    }
}

/// Evaluates a task at `now`.
///
/// Inactive tasks are never due.
///
/// # Errors
///
/// Returns [`ScheduleError`] when the task's schedule data is unusable.
pub fn evaluate(
    task: &ScheduledTask,
    now: DateTime<Utc>,
    polling_window: Duration,
) -> Result<Evaluation, ScheduleError> {
    if !task.is_active() {
        return Ok(Evaluation::NOT_DUE);
    }

    match task.schedule() {
        Schedule::Cron(fields) => evaluate_cron(fields, task.timezone(), now, polling_window),
        Schedule::Interval { every, period } => {
            evaluate_interval(*every, *period, task.last_run_at(), now)
        }
        Schedule::DateTime { instant } => evaluate_datetime(*instant, task.timezone(), now),
    }
}

/// Cron tasks are due when the latest scheduled occurrence, in the task's
/// zone, lies within `polling_window` of `now`.
///
/// No state is recorded, so an occurrence missed for longer than one window
/// (scheduler downtime) is skipped rather than replayed.
///
/// # Errors
///
/// Returns [`ScheduleError::InvalidCron`] when the fields do not compile.
pub fn evaluate_cron(
    fields: &CronFields,
    timezone: TaskTimezone,
    now: DateTime<Utc>,
    polling_window: Duration,
) -> Result<Evaluation, ScheduleError> {
    let matcher = CronMatcher::compile(fields)?;
    let base_time = now.with_timezone(&timezone.tz());
    let Some(previous) = matcher.previous_fire_time(&base_time) else {
        return Ok(Evaluation::NOT_DUE);
    };

    if base_time - previous <= polling_window {
        Ok(Evaluation::due(None))
    } else {
        Ok(Evaluation::NOT_DUE)
    }
}

/// Interval tasks are due once `every` periods have elapsed since the last
/// run, or immediately if they never ran.
///
/// Firing records `now` rather than the theoretical due time, so lateness
/// never accumulates into drift.
///
/// # Errors
///
/// Returns [`ScheduleError::NonPositiveInterval`] for `every == 0` and
/// [`ScheduleError::IntervalOverflow`] when the next run is unrepresentable.
pub fn evaluate_interval(
    every: u32,
    period: IntervalPeriod,
    last_run_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Evaluation, ScheduleError> {
    if every == 0 {
        return Err(ScheduleError::NonPositiveInterval(every));
    }

    let next_run_time = match last_run_at {
        None => now,
        Some(last_run) => period
            .times(every)
            .and_then(|step| last_run.checked_add_signed(step))
            .ok_or(ScheduleError::IntervalOverflow {
                every,
                period: period.as_str(),
            })?,
    };

    if next_run_time <= now {
        Ok(Evaluation::due(Some(TaskMutation::RecordRun { at: now })))
    } else {
        Ok(Evaluation::NOT_DUE)
    }
}

/// One-shot tasks are due once their local date-time, resolved in the task's
/// zone, has passed. Firing deactivates the task.
///
/// # Errors
///
/// Returns [`ScheduleError::UnresolvableLocalTime`] when the local time
/// cannot be mapped to an instant.
pub fn evaluate_datetime(
    instant: NaiveDateTime,
    timezone: TaskTimezone,
    now: DateTime<Utc>,
) -> Result<Evaluation, ScheduleError> {
    let scheduled = timezone
        .localize(instant)
        .ok_or_else(|| ScheduleError::UnresolvableLocalTime {
            local: instant.to_string(),
            timezone: timezone.name().to_owned(),
        })?;

    if scheduled <= now {
        Ok(Evaluation::due(Some(TaskMutation::Deactivate)))
    } else {
        Ok(Evaluation::NOT_DUE)
    }
}
