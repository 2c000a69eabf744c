//! Stored document layouts and malformed-row decoding.

use super::support::{FixedClock, cron, local, task_with, utc, zone};
use crate::scheduler::domain::{
    IntervalPeriod, Schedule, ScheduledTask, Step, TaskId, TaskRecord, ToolName, Workflow,
};
use rstest::rstest;
use serde_json::json;

#[rstest]
fn cron_schedule_uses_the_discriminated_layout() {
    let document = serde_json::to_value(cron("30 8 * 1-6 1-5")).expect("encodable");

    assert_eq!(
        document,
        json!({
            "type": "cron",
            "value": {
                "minute": "30",
                "hour": "8",
                "day_of_month": "*",
                "month_of_year": "1-6",
                "day_of_week": "1-5"
            }
        })
    );
}

#[rstest]
#[case(json!({"type": "interval", "value": {"every": 5, "period": "minutes"}}),
       Schedule::Interval { every: 5, period: IntervalPeriod::Minutes })]
#[case(json!({"type": "datetime", "value": {"iso_datetime": "2024-06-01T10:00:00"}}),
       Schedule::at(local(2024, 6, 1, 10, 0)))]
fn decodes_interval_and_datetime_documents(
    #[case] document: serde_json::Value,
    #[case] expected: Schedule,
) {
    let schedule: Schedule = serde_json::from_value(document).expect("decodable");

    assert_eq!(schedule, expected);
}

#[rstest]
fn workflow_steps_default_to_empty_parameters() {
    let workflow: Workflow = serde_json::from_value(json!([
        {"tool": "scrape_web", "parameters": {"url": "https://example.com", "selector": "h1"}},
        {"tool": "send_email"}
    ]))
    .expect("decodable");

    assert_eq!(workflow.len(), 2);
    let tools: Vec<&str> = workflow.steps().iter().map(|step| step.tool().as_str()).collect();
    assert_eq!(tools, ["scrape_web", "send_email"]);
    assert!(workflow.steps().iter().all(|step| step.tool().is_builtin()));
}

#[rstest]
fn blank_tool_names_are_rejected() {
    let result = serde_json::from_value::<Workflow>(json!([{"tool": "  "}]));

    assert!(result.is_err());
}

#[rstest]
fn record_round_trips_a_task() {
    let clock = FixedClock::at(utc(2024, 6, 1, 0, 0, 0));
    let workflow = Workflow::empty()
        .then(
            Step::new(ToolName::new(ToolName::CALL_API).expect("tool"))
                .with_parameter("url", "https://api.example.com"),
        )
        .then(Step::new(ToolName::new("summarise").expect("tool")));
    let task = ScheduledTask::new(
        "digest",
        workflow,
        Schedule::interval(1, IntervalPeriod::Days).expect("positive"),
        zone("EST"),
        &clock,
    );

    let record = TaskRecord::from_task(&task).expect("encodable");
    assert_eq!(record.timezone, "America/New_York");
    let decoded = ScheduledTask::try_from(record).expect("decodable");

    assert_eq!(decoded, task);
}

fn every_minute() -> serde_json::Value {
    serde_json::to_value(cron("* * * * *")).expect("encodable")
}

#[rstest]
#[case("schedule", json!({"type": "weekly", "value": {}}), json!([]), "UTC", Some("weekly"))]
#[case("workflow", every_minute(), json!({"tool": "x"}), "UTC", Some("cron"))]
#[case("timezone", json!({"type": "interval", "value": {"every": 1, "period": "days"}}), json!([]), "Nowhere/Land", Some("interval"))]
#[case("schedule", json!("daily"), json!([]), "UTC", None)]
fn undecodable_rows_become_malformed_tasks(
    #[case] field: &str,
    #[case] schedule: serde_json::Value,
    #[case] workflow: serde_json::Value,
    #[case] timezone: &str,
    #[case] schedule_type: Option<&str>,
) {
    let clock = FixedClock::at(utc(2024, 6, 1, 0, 0, 0));
    let mut record =
        TaskRecord::from_task(&task_with(cron("* * * * *"), "UTC", &clock)).expect("encodable");
    record.schedule = schedule;
    record.workflow = workflow;
    record.timezone = timezone.to_owned();
    let task_id = TaskId::from_uuid(record.id);

    let malformed = ScheduledTask::try_from(record).expect_err("malformed row");

    assert_eq!(malformed.task_id, task_id);
    assert_eq!(malformed.schedule_type.as_deref(), schedule_type);
    assert_eq!(malformed.field, field);
}
