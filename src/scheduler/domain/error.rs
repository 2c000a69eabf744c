//! Error types for scheduled-task validation and schedule evaluation.

use thiserror::Error;

/// Errors returned while constructing domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The time-zone name is not a known IANA zone or abbreviation.
    #[error("unknown time zone: {0}")]
    UnknownTimezone(String),

    /// The tool identifier of a workflow step is empty after trimming.
    #[error("workflow step tool must not be empty")]
    EmptyToolName,

    /// An interval schedule must repeat at least once per period.
    #[error("interval must be a positive integer, got {0}")]
    NonPositiveInterval(u32),

    /// A cron field is empty or contains whitespace.
    #[error("invalid cron field {field}: '{value}'")]
    InvalidCronField {
        /// Name of the offending field.
        field: &'static str,
        /// Raw field value.
        value: String,
    },
}

/// Errors that make a single task's schedule unusable for evaluation.
///
/// These never abort a beat cycle: the affected task is skipped, left
/// active, and reported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The cron fields do not form a valid expression.
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron {
        /// Normalised expression that failed to parse.
        expression: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// An interval of zero would make the task permanently due.
    #[error("interval must be a positive integer, got {0}")]
    NonPositiveInterval(u32),

    /// Adding the interval to the last run overflowed the calendar.
    #[error("interval of {every} {period} overflows the supported date range")]
    IntervalOverflow {
        /// Interval multiplier.
        every: u32,
        /// Interval unit.
        period: &'static str,
    },

    /// The local date-time cannot be mapped to an instant in the zone.
    #[error("local time {local} does not exist in time zone {timezone}")]
    UnresolvableLocalTime {
        /// Naive local date-time.
        local: String,
        /// Zone name.
        timezone: String,
    },
}

/// A persisted task whose stored documents could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed task {task_id}: {field} is unreadable ({reason})")]
pub struct MalformedTask {
    /// Identifier of the unreadable task.
    pub task_id: super::TaskId,
    /// Raw `type` discriminator of the schedule document, when present.
    pub schedule_type: Option<String>,
    /// Column or document that failed to decode.
    pub field: &'static str,
    /// Decoder diagnostic.
    pub reason: String,
}
