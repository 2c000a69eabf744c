//! Values handed from the evaluation phase to the dispatch phase.

use super::{OccurrenceId, ScheduleKind, ScheduledTask, TaskId, ToolName, Workflow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Immutable snapshot of a due task, taken before its mutation was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueTask {
    task_id: TaskId,
    task_name: String,
    schedule_kind: ScheduleKind,
    workflow: Workflow,
    fired_at: DateTime<Utc>,
}

impl DueTask {
    /// Captures the dispatch-relevant parts of `task` fired at `fired_at`.
    #[must_use]
    pub fn snapshot(task: &ScheduledTask, fired_at: DateTime<Utc>) -> Self {
        Self {
            task_id: task.id(),
            task_name: task.task_name().to_owned(),
            schedule_kind: task.schedule().kind(),
            workflow: task.workflow().clone(),
            fired_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the display label.
    #[must_use]
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Returns the kind of schedule that fired.
    #[must_use]
    pub const fn schedule_kind(&self) -> ScheduleKind {
        self.schedule_kind
    }

    /// Returns the workflow as it was before evaluation.
    #[must_use]
    pub const fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Returns the evaluation instant.
    #[must_use]
    pub const fn fired_at(&self) -> DateTime<Utc> {
        self.fired_at
    }

    /// Returns the identifier of this occurrence.
    #[must_use]
    pub fn occurrence_id(&self) -> OccurrenceId {
        OccurrenceId::for_firing(self.task_id, self.fired_at)
    }
}

/// One executable unit in a work chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Zero-based position in the chain.
    pub position: usize,
    /// Executor to invoke.
    pub tool: ToolName,
    /// Arguments for the executor.
    pub parameters: Map<String, Value>,
}

/// Ordered, non-empty chain of work items.
///
/// The executor side feeds each item's result into the next; the chain only
/// declares the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkChain(Vec<WorkItem>);

impl WorkChain {
    /// Builds a chain with one item per workflow step, preserving order.
    ///
    /// Returns `None` for an empty workflow.
    #[must_use]
    pub fn build(workflow: &Workflow) -> Option<Self> {
        if workflow.is_empty() {
            return None;
        }
        let items = workflow
            .steps()
            .iter()
            .enumerate()
            .map(|(position, step)| WorkItem {
                position,
                tool: step.tool().clone(),
                parameters: step.parameters().clone(),
            })
            .collect();
        Some(Self(items))
    }

    /// Returns the items in execution order.
    #[must_use]
    pub fn items(&self) -> &[WorkItem] {
        &self.0
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; chains are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A chain addressed to the work queue under a unique occurrence identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Unique identifier of this firing.
    pub occurrence_id: OccurrenceId,
    /// Task the chain belongs to.
    pub task_id: TaskId,
    /// Steps to execute in order.
    pub chain: WorkChain,
}

impl Occurrence {
    /// Builds the occurrence for a due task, or `None` when its workflow is
    /// empty.
    #[must_use]
    pub fn for_due_task(due: &DueTask) -> Option<Self> {
        WorkChain::build(due.workflow()).map(|chain| Self {
            occurrence_id: due.occurrence_id(),
            task_id: due.task_id(),
            chain,
        })
    }
}
