//! Cron matching over the five standard fields.
//!
//! The `cron` crate works on six-field expressions with a seconds column and
//! numbers weekdays from one. Classic cron numbers them from zero (with `7`
//! as a second Sunday) and fires when *either* day field matches if both are
//! restricted (neither starts with `*`). This module bridges both differences.

use super::{CronFields, ScheduleError};
use chrono::{DateTime, Duration, TimeZone, Timelike};
use ::cron::Schedule as CronSchedule;
use std::collections::BTreeSet;
use std::str::FromStr;

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Compiled matcher for a task's cron fields.
#[derive(Debug, Clone)]
pub struct CronMatcher {
    expression: String,
    schedules: Vec<CronSchedule>,
}

impl CronMatcher {
    /// Compiles cron fields into a matcher.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidCron`] when any field is malformed.
    pub fn compile(fields: &CronFields) -> Result<Self, ScheduleError> {
        let expression = fields.to_string();
        let invalid = |reason: String| ScheduleError::InvalidCron {
            expression: expression.clone(),
            reason,
        };

        let weekdays = translate_day_of_week(&fields.day_of_week).map_err(invalid)?;
        let day_of_month = fields.day_of_month.as_str();
        let either_day_matches =
            !is_unrestricted(day_of_month) && !is_unrestricted(&fields.day_of_week);

        let variants: Vec<(&str, &str)> = match weekdays.as_deref() {
            None => vec![(day_of_month, "*")],
            Some(days) if either_day_matches => vec![(day_of_month, "*"), ("*", days)],
            Some(days) => vec![(day_of_month, days)],
        };

        let schedules = variants
            .into_iter()
            .map(|(dom, dow)| {
                let six_field = format!(
                    "0 {} {} {} {} {}",
                    fields.minute,
                    fields.hour,
                    normalise_wildcard(dom),
                    fields.month,
                    dow
                );
                CronSchedule::from_str(&six_field).map_err(|err| invalid(err.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            expression,
            schedules,
        })
    }

    /// Returns the five-field expression this matcher was compiled from.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns the most recent scheduled occurrence at or before `at`.
    #[must_use]
    pub fn previous_fire_time<Z>(&self, at: &DateTime<Z>) -> Option<DateTime<Z>>
    where
        Z: TimeZone,
    {
        // Occurrences land on whole seconds; searching strictly before the
        // next whole second includes `at` itself.
        let upper = at.with_nanosecond(0)? + Duration::seconds(1);
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&upper).next_back())
            .max()
    }
}

fn is_wildcard(field: &str) -> bool {
    matches!(field, "*" | "?")
}

/// Classic cron treats any day field starting with `*` as unrestricted, so
/// `*/2` combines with a day-of-week restriction instead of widening it.
fn is_unrestricted(field: &str) -> bool {
    field.starts_with('*') || field == "?"
}

fn normalise_wildcard(field: &str) -> &str {
    if is_wildcard(field) { "*" } else { field }
}

/// Rewrites a classic day-of-week field as explicit weekday names.
///
/// Returns `Ok(None)` for a wildcard.
fn translate_day_of_week(field: &str) -> Result<Option<String>, String> {
    if is_wildcard(field) {
        return Ok(None);
    }

    let mut days = BTreeSet::new();
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step = step
                    .parse::<usize>()
                    .ok()
                    .filter(|value| *value > 0)
                    .ok_or_else(|| format!("invalid day-of-week step '{step}'"))?;
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" {
            (0, 6)
        } else if let Some((first, last)) = range.split_once('-') {
            (weekday_number(first)?, weekday_number(last)?)
        } else {
            let day = weekday_number(range)?;
            (day, if step.is_some() { 6 } else { day })
        };

        if start > end {
            return Err(format!("day-of-week range '{range}' is reversed"));
        }
        days.extend((start..=end).step_by(step.unwrap_or(1)).map(|day| day % 7));
    }

    let names: Vec<&str> = days
        .into_iter()
        .filter_map(|day| WEEKDAY_NAMES.get(day).copied())
        .collect();
    Ok(Some(names.join(",")))
}

fn weekday_number(token: &str) -> Result<usize, String> {
    if let Ok(number) = token.parse::<usize>() {
        return if number <= 7 {
            Ok(number)
        } else {
            Err(format!("day-of-week {number} is out of range 0-7"))
        };
    }

    WEEKDAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .ok_or_else(|| format!("unknown day-of-week '{token}'"))
}
