//! Shared test helpers for in-memory beat loop integration tests.

use chrono::NaiveDate;
use mockable::DefaultClock;
use rstest::fixture;
use std::sync::Arc;
use std::time::Duration;
use taskbeat::config::SchedulerConfig;
use taskbeat::scheduler::{
    adapters::memory::{InMemoryTaskStore, InMemoryWorkQueue},
    domain::{IntervalPeriod, Schedule, Step, ToolName, Workflow},
    ports::{TaskStore, WorkQueue},
    services::{BeatCycle, RegisterTaskRequest, SchedulerContext, TaskRegistrationService},
};

/// Store type shared by the integration tests.
pub type MemoryStore = InMemoryTaskStore<DefaultClock>;

/// Provides a fresh store.
#[fixture]
pub fn store() -> Arc<MemoryStore> {
    Arc::new(InMemoryTaskStore::new())
}

/// Provides a fresh queue.
#[fixture]
pub fn queue() -> Arc<InMemoryWorkQueue> {
    Arc::new(InMemoryWorkQueue::new())
}

/// Configuration with a one-second cadence.
///
/// # Errors
///
/// Returns an error if the configuration is rejected.
pub fn fast_config() -> eyre::Result<SchedulerConfig> {
    Ok(SchedulerConfig::new(
        Duration::from_secs(1),
        Duration::from_secs(1),
        4,
        Duration::from_secs(5),
    )?)
}

/// Builds a beat cycle over the given store and queue.
///
/// # Errors
///
/// Returns an error if the configuration is rejected.
pub fn cycle<S, Q>(store: &Arc<S>, queue: &Arc<Q>) -> eyre::Result<BeatCycle<S, Q, DefaultClock>>
where
    S: TaskStore + 'static,
    Q: WorkQueue + 'static,
{
    Ok(BeatCycle::new(SchedulerContext::new(
        Arc::clone(store),
        Arc::clone(queue),
        Arc::new(DefaultClock),
        fast_config()?,
    )))
}

/// Workflow that scrapes a page and mails the result.
///
/// # Errors
///
/// Returns an error if a tool name is rejected.
pub fn scrape_and_mail() -> eyre::Result<Workflow> {
    Ok(Workflow::empty()
        .then(
            Step::new(ToolName::new(ToolName::SCRAPE_WEB)?)
                .with_parameter("url", "https://example.com/status")
                .with_parameter("selector", "#uptime"),
        )
        .then(
            Step::new(ToolName::new(ToolName::SEND_EMAIL)?)
                .with_parameter("to", "ops@example.com"),
        ))
}

/// Registers `count` tasks that are due on the next cycle and stay due
/// for an hour afterwards.
///
/// # Errors
///
/// Returns an error if registration fails.
pub async fn register_hourly(store: &Arc<MemoryStore>, count: usize) -> eyre::Result<()> {
    let service = TaskRegistrationService::new(Arc::clone(store), Arc::new(DefaultClock));
    for index in 0..count {
        let request = RegisterTaskRequest::new(
            format!("hourly {index}"),
            scrape_and_mail()?,
            Schedule::interval(1, IntervalPeriod::Hours)?,
        );
        service.create_task(request).await?;
    }
    Ok(())
}

/// Registers `count` one-shot tasks whose time has already passed.
///
/// # Errors
///
/// Returns an error if registration fails.
pub async fn register_overdue_one_shots(store: &Arc<MemoryStore>, count: usize) -> eyre::Result<()> {
    let service = TaskRegistrationService::new(Arc::clone(store), Arc::new(DefaultClock));
    let instant = NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .ok_or_else(|| eyre::eyre!("invalid fixture date"))?;
    for index in 0..count {
        let request = RegisterTaskRequest::new(
            format!("one shot {index}"),
            scrape_and_mail()?,
            Schedule::at(instant),
        )
        .with_timezone("Europe/London");
        service.create_task(request).await?;
    }
    Ok(())
}
