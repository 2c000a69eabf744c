//! Shared fixtures for scheduler unit tests.

use crate::scheduler::domain::{
    CronFields, Schedule, ScheduledTask, Step, TaskTimezone, ToolName, Workflow,
};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use mockable::Clock;
use std::sync::Mutex;

/// Clock pinned to an instant that tests move explicitly.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock") = now;
    }
}

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .expect("valid UTC instant")
}

pub fn local(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .expect("valid local date-time")
}

pub fn zone(name: &str) -> TaskTimezone {
    TaskTimezone::parse(name).expect("known zone")
}

pub fn cron(expression: &str) -> Schedule {
    Schedule::Cron(CronFields::parse(expression).expect("five cron fields"))
}

pub fn email_workflow() -> Workflow {
    Workflow::empty().then(
        Step::new(ToolName::new(ToolName::SEND_EMAIL).expect("builtin tool"))
            .with_parameter("to", "ops@example.com"),
    )
}

pub fn task_with(schedule: Schedule, timezone: &str, clock: &FixedClock) -> ScheduledTask {
    ScheduledTask::new("report", email_workflow(), schedule, zone(timezone), clock)
}
