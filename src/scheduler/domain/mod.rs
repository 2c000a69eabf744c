//! Domain model for scheduled tasks.
//!
//! The scheduling domain covers schedule variants, time-zone resolution,
//! schedule evaluation, workflows, and the snapshot values that cross from
//! evaluation into dispatch. Infrastructure concerns stay outside.

mod dispatch;
mod error;
mod evaluation;
mod ids;
mod matcher;
mod record;
mod schedule;
mod task;
mod timezone;
mod workflow;

pub use dispatch::{DueTask, Occurrence, WorkChain, WorkItem};
pub use error::{MalformedTask, ScheduleError, TaskDomainError};
pub use evaluation::{Evaluation, evaluate, evaluate_cron, evaluate_datetime, evaluate_interval};
pub use ids::{OccurrenceId, TaskId};
pub use matcher::CronMatcher;
pub use record::TaskRecord;
pub use schedule::{CronFields, IntervalPeriod, Schedule, ScheduleKind};
pub use task::{PersistedTaskData, ScheduledTask, TaskMutation};
pub use timezone::TaskTimezone;
pub use workflow::{Step, ToolName, Workflow};
