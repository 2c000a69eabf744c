//! One beat cycle: a locked evaluation transaction followed by dispatch.
//!
//! Phase one runs entirely inside a store transaction on a blocking thread.
//! It evaluates every active task, records the mutations of the due ones,
//! and commits before anything is published. Phase two publishes the
//! pre-mutation snapshots with bounded concurrency. A publish failure is
//! reported but never reverts the committed state.

use super::context::SchedulerContext;
use crate::scheduler::{
    domain::{DueTask, MalformedTask, Occurrence, OccurrenceId, TaskId, TaskMutation, evaluate},
    ports::{EvaluationTransaction, TaskStore, TaskStoreError, WorkQueue},
};
use chrono::{DateTime, Duration, Utc};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Errors that abort a whole cycle.
///
/// Per-task schedule problems and publish failures are not errors at this
/// level; they appear in the [`CycleReport`].
#[derive(Debug, Error)]
pub enum CycleError {
    /// The store failed while the evaluation transaction was open.
    #[error(transparent)]
    Store(#[from] TaskStoreError),

    /// The evaluation transaction ran past the configured bound and was
    /// rolled back.
    #[error("evaluation transaction exceeded {0:?}")]
    TimedOut(std::time::Duration),

    /// The evaluation was abandoned before commit and rolled back.
    #[error("evaluation abandoned before commit")]
    Abandoned,

    /// The blocking evaluation worker panicked or was cancelled.
    #[error("evaluation worker failed: {0}")]
    Worker(String),
}

/// A task left out of a cycle because its stored data is unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTask {
    /// Identifier of the skipped task.
    pub task_id: TaskId,
    /// Schedule discriminator, when it could be read.
    pub schedule_type: Option<String>,
    /// Why the task was skipped.
    pub reason: String,
}

impl From<MalformedTask> for SkippedTask {
    fn from(malformed: MalformedTask) -> Self {
        Self {
            task_id: malformed.task_id,
            schedule_type: malformed.schedule_type.clone(),
            reason: malformed.to_string(),
        }
    }
}

/// Result of the evaluation phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationOutcome {
    /// Number of decodable active tasks evaluated.
    pub evaluated: usize,
    /// Tasks skipped because of unusable data. They stay active.
    pub skipped: Vec<SkippedTask>,
    /// Snapshots of the tasks that fired, taken before their mutations.
    pub due: Vec<DueTask>,
}

/// A publish that did not reach the work queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishFailure {
    /// Task whose occurrence was lost.
    pub task_id: TaskId,
    /// Identifier of the lost occurrence.
    pub occurrence_id: OccurrenceId,
    /// Error reported by the queue or the publish worker.
    pub reason: String,
}

/// Result of the dispatch phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Occurrences accepted by the work queue, sorted by identifier.
    pub published: Vec<OccurrenceId>,
    /// Due tasks with nothing to publish.
    pub empty_workflows: Vec<TaskId>,
    /// Publishes that failed.
    pub failures: Vec<PublishFailure>,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Instant every task was evaluated against.
    pub now: DateTime<Utc>,
    /// Evaluation phase result.
    pub evaluation: EvaluationOutcome,
    /// Dispatch phase result.
    pub dispatch: DispatchReport,
}

/// Evaluates every locked task and commits the due tasks' mutations.
///
/// Malformed rows and unusable schedules are logged and skipped. When
/// `abandon` is cancelled before commit, or any store call fails, the
/// transaction is rolled back and nothing is persisted.
///
/// # Errors
///
/// Returns [`CycleError::Store`] when the store fails and
/// [`CycleError::Abandoned`] when `abandon` fired.
pub fn evaluate_and_commit<T>(
    mut transaction: T,
    now: DateTime<Utc>,
    polling_window: Duration,
    abandon: &CancellationToken,
) -> Result<EvaluationOutcome, CycleError>
where
    T: EvaluationTransaction,
{
    match evaluate_locked(&mut transaction, now, polling_window) {
        Ok(_) if abandon.is_cancelled() => {
            roll_back(transaction);
            Err(CycleError::Abandoned)
        }
        Ok(outcome) => match transaction.commit() {
            Ok(()) => Ok(outcome),
            Err(err) => {
                error!(error = %err, "evaluation commit failed");
                Err(err.into())
            }
        },
        Err(err) => {
            error!(error = %err, "evaluation failed, rolling back");
            roll_back(transaction);
            Err(err.into())
        }
    }
}

fn evaluate_locked<T>(
    transaction: &mut T,
    now: DateTime<Utc>,
    polling_window: Duration,
) -> Result<EvaluationOutcome, TaskStoreError>
where
    T: EvaluationTransaction,
{
    let mut outcome = EvaluationOutcome::default();
    let mut mutations: Vec<(TaskId, TaskMutation)> = Vec::new();

    for fetched in transaction.fetch_active_for_evaluation()? {
        let task = match fetched {
            Ok(task) => task,
            Err(malformed) => {
                warn!(
                    task_id = %malformed.task_id,
                    schedule_type = malformed.schedule_type.as_deref().unwrap_or("unknown"),
                    error = %malformed,
                    "skipping malformed task"
                );
                outcome.skipped.push(malformed.into());
                continue;
            }
        };
        outcome.evaluated += 1;

        match evaluate(&task, now, polling_window) {
            Ok(evaluation) if evaluation.is_due() => {
                debug!(
                    task_id = %task.id(),
                    schedule_type = task.schedule().kind().as_str(),
                    "task is due"
                );
                outcome.due.push(DueTask::snapshot(&task, now));
                if let Some(mutation) = evaluation.mutation() {
                    mutations.push((task.id(), mutation));
                }
            }
            Ok(_) => {}
            Err(schedule_error) => {
                let kind = task.schedule().kind().as_str();
                warn!(
                    task_id = %task.id(),
                    schedule_type = kind,
                    error = %schedule_error,
                    "skipping task with unusable schedule"
                );
                outcome.skipped.push(SkippedTask {
                    task_id: task.id(),
                    schedule_type: Some(kind.to_owned()),
                    reason: schedule_error.to_string(),
                });
            }
        }
    }

    for (task_id, mutation) in mutations {
        transaction.apply_mutation(task_id, mutation)?;
    }
    Ok(outcome)
}

fn log_unrecognised_tools(occurrence: &Occurrence) {
    for item in occurrence.chain.items() {
        if !item.tool.is_builtin() {
            debug!(
                task_id = %occurrence.task_id,
                tool = item.tool.as_str(),
                "dispatching unrecognised tool"
            );
        }
    }
}

fn roll_back<T: EvaluationTransaction>(transaction: T) {
    if let Err(err) = transaction.rollback() {
        error!(error = %err, "evaluation rollback failed");
    }
}

/// Runs complete beat cycles against one [`SchedulerContext`].
pub struct BeatCycle<S, Q, C>
where
    S: TaskStore,
    Q: WorkQueue,
    C: Clock + Send + Sync,
{
    context: SchedulerContext<S, Q, C>,
}

impl<S, Q, C> Clone for BeatCycle<S, Q, C>
where
    S: TaskStore,
    Q: WorkQueue,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<S, Q, C> BeatCycle<S, Q, C>
where
    S: TaskStore + 'static,
    Q: WorkQueue + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a cycle runner.
    #[must_use]
    pub const fn new(context: SchedulerContext<S, Q, C>) -> Self {
        Self { context }
    }

    /// Returns the shared context.
    #[must_use]
    pub const fn context(&self) -> &SchedulerContext<S, Q, C> {
        &self.context
    }

    /// Runs one cycle at the clock's current instant.
    ///
    /// Dispatch only starts after the evaluation transaction committed, and
    /// is skipped when nothing is due.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError`] when the evaluation phase fails. Nothing was
    /// persisted or published in that case.
    pub async fn run(&self) -> Result<CycleReport, CycleError> {
        let now = self.context.clock().utc();
        let span = info_span!("beat_cycle", %now);

        async move {
            let evaluation = self.evaluate(now).await?;
            let dispatch = if evaluation.due.is_empty() {
                DispatchReport::default()
            } else {
                self.dispatch(evaluation.due.clone()).await
            };

            info!(
                evaluated = evaluation.evaluated,
                skipped = evaluation.skipped.len(),
                due = evaluation.due.len(),
                published = dispatch.published.len(),
                failed = dispatch.failures.len(),
                "beat cycle complete"
            );
            Ok(CycleReport {
                now,
                evaluation,
                dispatch,
            })
        }
        .instrument(span)
        .await
    }

    /// Runs the evaluation phase on a blocking thread, bounded by the
    /// configured timeout.
    ///
    /// On timeout the transaction is told to abandon itself and the worker is
    /// awaited until it finishes. A worker that reached the commit point
    /// first still commits; its outcome is returned so that the committed
    /// due tasks are dispatched. Otherwise it rolls back and the timeout is
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns [`CycleError`] on store failure, timeout, or worker panic.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> Result<EvaluationOutcome, CycleError> {
        let config = self.context.config();
        let timeout = config.phase_one_timeout();
        let polling_window = config.polling_window_delta();
        let store = Arc::clone(self.context.store());
        let abandon = CancellationToken::new();
        let worker_abandon = abandon.clone();

        let mut worker = tokio::task::spawn_blocking(move || {
            let transaction = store.begin_evaluation()?;
            evaluate_and_commit(transaction, now, polling_window, &worker_abandon)
        });

        let joined = match tokio::time::timeout(timeout, &mut worker).await {
            Ok(joined) => joined,
            Err(_) => {
                abandon.cancel();
                error!(timeout = ?timeout, "evaluation transaction timed out, abandoning");
                match worker.await {
                    Ok(Ok(outcome)) => {
                        warn!(
                            timeout = ?timeout,
                            due = outcome.due.len(),
                            "evaluation committed after the timeout"
                        );
                        return Ok(outcome);
                    }
                    Ok(Err(CycleError::Abandoned)) => return Err(CycleError::TimedOut(timeout)),
                    other => other,
                }
            }
        };

        match joined {
            Ok(result) => result,
            Err(join_error) => Err(CycleError::Worker(join_error.to_string())),
        }
    }

    /// Publishes one occurrence per due task with bounded concurrency.
    ///
    /// Failures are logged and collected; they never affect other publishes.
    pub async fn dispatch(&self, due: Vec<DueTask>) -> DispatchReport {
        let limit = self.context.config().publish_concurrency().get();
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut in_flight = JoinSet::new();
        let mut pending = HashMap::new();
        let mut report = DispatchReport::default();

        for task in due {
            let Some(occurrence) = Occurrence::for_due_task(&task) else {
                info!(
                    task_id = %task.task_id(),
                    task_name = task.task_name(),
                    "due task has an empty workflow"
                );
                report.empty_workflows.push(task.task_id());
                continue;
            };
            log_unrecognised_tools(&occurrence);

            let queue = Arc::clone(self.context.queue());
            let permits = Arc::clone(&semaphore);
            let target = (task.task_id(), occurrence.occurrence_id.clone());
            let handle = in_flight.spawn(async move {
                let _permit = permits.acquire().await.ok();
                queue.publish(&occurrence).await
            });
            pending.insert(handle.id(), target);
        }

        while let Some(joined) = in_flight.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, result)) => (id, result.map_err(|err| err.to_string())),
                Err(join_error) => (join_error.id(), Err(join_error.to_string())),
            };
            let Some((task_id, occurrence_id)) = pending.remove(&id) else {
                continue;
            };
            match outcome {
                Ok(()) => report.published.push(occurrence_id),
                Err(reason) => {
                    error!(
                        task_id = %task_id,
                        occurrence_id = %occurrence_id,
                        error = %reason,
                        "failed to publish occurrence"
                    );
                    report.failures.push(PublishFailure {
                        task_id,
                        occurrence_id,
                        reason,
                    });
                }
            }
        }

        report.published.sort();
        report
    }
}
