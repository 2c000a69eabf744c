//! Time-zone handling for task-local schedule evaluation.

use super::TaskDomainError;
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Abbreviations users commonly supply instead of IANA names.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("IST", "Asia/Kolkata"),
    ("PST", "America/Los_Angeles"),
    ("PDT", "America/Los_Angeles"),
    ("MST", "America/Denver"),
    ("MDT", "America/Denver"),
    ("CST", "America/Chicago"),
    ("CDT", "America/Chicago"),
    ("EST", "America/New_York"),
    ("EDT", "America/New_York"),
    ("GMT", "Etc/GMT"),
    ("UTC", "UTC"),
];

/// How far back the offset before a daylight-saving gap is searched for.
const MAX_GAP_MINUTES: i64 = 180;

/// IANA time zone in which a task's schedule is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskTimezone(Tz);

impl TaskTimezone {
    /// Parses an IANA zone name, accepting common abbreviations such as `EST`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::UnknownTimezone`] when the name matches
    /// neither an abbreviation nor an IANA zone.
    pub fn parse(value: &str) -> Result<Self, TaskDomainError> {
        let trimmed = value.trim();
        let upper = trimmed.to_ascii_uppercase();
        let name = ABBREVIATIONS
            .iter()
            .find(|(abbreviation, _)| *abbreviation == upper)
            .map_or(trimmed, |(_, zone)| zone);

        name.parse::<Tz>()
            .map(Self)
            .map_err(|_| TaskDomainError::UnknownTimezone(value.to_owned()))
    }

    /// Returns the wrapped zone.
    #[must_use]
    pub const fn tz(self) -> Tz {
        self.0
    }

    /// Returns the canonical IANA name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.0.name()
    }

    /// Resolves a naive local date-time to an instant in this zone.
    ///
    /// Ambiguous times (clocks falling back) resolve to the later, standard
    /// time instant. Times inside a spring-forward gap keep their wall-clock
    /// reading at the offset in force before the gap, so `02:30` in a
    /// one-hour gap lands on `03:30` after it. Returns `None` only when no
    /// valid local minute exists within three hours before the time.
    #[must_use]
    pub fn localize(self, local: NaiveDateTime) -> Option<DateTime<Tz>> {
        match self.0.from_local_datetime(&local) {
            LocalResult::Single(instant) => Some(instant),
            LocalResult::Ambiguous(_, latest) => Some(latest),
            LocalResult::None => {
                let before_gap = (1..=MAX_GAP_MINUTES).find_map(|minutes| {
                    let shifted = local.checked_sub_signed(Duration::minutes(minutes))?;
                    self.0.from_local_datetime(&shifted).latest()
                })?;
                before_gap
                    .offset()
                    .fix()
                    .from_local_datetime(&local)
                    .single()
                    .map(|instant| instant.with_timezone(&self.0))
            }
        }
    }
}

impl TryFrom<String> for TaskTimezone {
    type Error = TaskDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TaskTimezone> for String {
    fn from(value: TaskTimezone) -> Self {
        value.name().to_owned()
    }
}

impl fmt::Display for TaskTimezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
