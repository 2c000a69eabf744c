//! Schedule variants persisted with each task.

use super::TaskDomainError;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// When a task fires.
///
/// Stored as a discriminated document: `{"type": "...", "value": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Schedule {
    /// Recurs according to five standard cron fields.
    Cron(CronFields),
    /// Recurs a fixed duration after the previous run.
    Interval {
        /// Number of periods between runs.
        every: u32,
        /// Unit of `every`.
        period: IntervalPeriod,
    },
    /// Fires once at a local wall-clock time in the task's zone.
    #[serde(rename = "datetime")]
    DateTime {
        /// Naive local date-time of the single firing.
        #[serde(rename = "iso_datetime")]
        instant: NaiveDateTime,
    },
}

impl Schedule {
    /// Builds a validated interval schedule.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NonPositiveInterval`] when `every` is zero.
    pub const fn interval(every: u32, period: IntervalPeriod) -> Result<Self, TaskDomainError> {
        if every == 0 {
            return Err(TaskDomainError::NonPositiveInterval(every));
        }
        Ok(Self::Interval { every, period })
    }

    /// Builds a one-shot schedule at the given local date-time.
    #[must_use]
    pub const fn at(instant: NaiveDateTime) -> Self {
        Self::DateTime { instant }
    }

    /// Returns the variant discriminator used in logs and storage.
    #[must_use]
    pub const fn kind(&self) -> ScheduleKind {
        match self {
            Self::Cron(_) => ScheduleKind::Cron,
            Self::Interval { .. } => ScheduleKind::Interval,
            Self::DateTime { .. } => ScheduleKind::DateTime,
        }
    }
}

/// Discriminator of a [`Schedule`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleKind {
    /// Cron schedule.
    Cron,
    /// Interval schedule.
    Interval,
    /// One-shot date-time schedule.
    DateTime,
}

impl ScheduleKind {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cron => "cron",
            Self::Interval => "interval",
            Self::DateTime => "datetime",
        }
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of an interval schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalPeriod {
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl IntervalPeriod {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }

    /// Returns `every` periods as a duration, or `None` on overflow.
    #[must_use]
    pub fn times(self, every: u32) -> Option<Duration> {
        let count = i64::from(every);
        match self {
            Self::Seconds => Duration::try_seconds(count),
            Self::Minutes => Duration::try_minutes(count),
            Self::Hours => Duration::try_hours(count),
            Self::Days => Duration::try_days(count),
        }
    }
}

impl fmt::Display for IntervalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five fields of a standard cron expression.
///
/// Each field accepts numbers, lists, ranges, steps, or `*`. Day of week uses
/// classic numbering where both `0` and `7` mean Sunday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronFields {
    /// Minute field (`0-59`).
    pub minute: String,
    /// Hour field (`0-23`).
    pub hour: String,
    /// Day-of-month field (`1-31`).
    pub day_of_month: String,
    /// Month field (`1-12` or `JAN-DEC`).
    #[serde(rename = "month_of_year", alias = "month")]
    pub month: String,
    /// Day-of-week field (`0-7` or `SUN-SAT`).
    pub day_of_week: String,
}

impl CronFields {
    /// Builds cron fields, rejecting empty or whitespace-bearing values.
    ///
    /// Full syntactic validation happens when the schedule is evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidCronField`] for the first field that
    /// is empty or contains whitespace.
    pub fn new(
        minute: impl Into<String>,
        hour: impl Into<String>,
        day_of_month: impl Into<String>,
        month: impl Into<String>,
        day_of_week: impl Into<String>,
    ) -> Result<Self, TaskDomainError> {
        let fields = Self {
            minute: minute.into(),
            hour: hour.into(),
            day_of_month: day_of_month.into(),
            month: month.into(),
            day_of_week: day_of_week.into(),
        };
        for (field, value) in fields.named() {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(TaskDomainError::InvalidCronField {
                    field,
                    value: value.to_owned(),
                });
            }
        }
        Ok(fields)
    }

    /// Parses a five-field expression such as `"0 9 * * 1"`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidCronField`] when the expression does
    /// not have exactly five fields.
    pub fn parse(expression: &str) -> Result<Self, TaskDomainError> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = parts.as_slice() else {
            return Err(TaskDomainError::InvalidCronField {
                field: "expression",
                value: expression.to_owned(),
            });
        };
        Self::new(*minute, *hour, *day_of_month, *month, *day_of_week)
    }

    /// Returns `(field name, value)` pairs in expression order.
    #[must_use]
    pub fn named(&self) -> [(&'static str, &str); 5] {
        [
            ("minute", self.minute.as_str()),
            ("hour", self.hour.as_str()),
            ("day_of_month", self.day_of_month.as_str()),
            ("month_of_year", self.month.as_str()),
            ("day_of_week", self.day_of_week.as_str()),
        ]
    }
}

impl fmt::Display for CronFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }
}
