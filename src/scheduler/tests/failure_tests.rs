//! Evaluation failures and timeouts: nothing persisted is ever left undispatched.

use super::support::{FixedClock, email_workflow, local, utc, zone};
use crate::config::SchedulerConfig;
use crate::scheduler::{
    adapters::memory::{InMemoryTaskStore, InMemoryWorkQueue},
    domain::{IntervalPeriod, Schedule, ScheduledTask, TaskId, TaskMutation},
    ports::{EvaluationTransaction, FetchedTask, TaskStore, TaskStoreError, TaskStoreResult},
    services::{BeatCycle, CycleError, SchedulerContext},
};
use async_trait::async_trait;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;

type MemoryStore = InMemoryTaskStore<FixedClock>;
type MemoryTransaction = <MemoryStore as TaskStore>::Transaction;

#[derive(Debug, Clone, Copy)]
enum Fault {
    SlowFetch(Duration),
    SlowCommit(Duration),
    FailFetch,
    FailApply,
    FailCommit,
}

/// Wraps the in-memory store and injects one fault into every transaction.
struct FaultyStore {
    inner: MemoryStore,
    fault: Fault,
}

struct FaultyTransaction {
    inner: MemoryTransaction,
    fault: Fault,
}

fn injected() -> TaskStoreError {
    TaskStoreError::persistence(std::io::Error::other("injected store failure"))
}

impl EvaluationTransaction for FaultyTransaction {
    fn fetch_active_for_evaluation(&mut self) -> TaskStoreResult<Vec<FetchedTask>> {
        match self.fault {
            Fault::FailFetch => Err(injected()),
            Fault::SlowFetch(delay) => {
                std::thread::sleep(delay);
                self.inner.fetch_active_for_evaluation()
            }
            _ => self.inner.fetch_active_for_evaluation(),
        }
    }

    fn apply_mutation(&mut self, task_id: TaskId, mutation: TaskMutation) -> TaskStoreResult<()> {
        if matches!(self.fault, Fault::FailApply) {
            return Err(injected());
        }
        self.inner.apply_mutation(task_id, mutation)
    }

    fn snapshot(&self, task_id: TaskId) -> Option<&ScheduledTask> {
        self.inner.snapshot(task_id)
    }

    fn commit(self) -> TaskStoreResult<()> {
        match self.fault {
            Fault::FailCommit => Err(injected()),
            Fault::SlowCommit(delay) => {
                std::thread::sleep(delay);
                self.inner.commit()
            }
            _ => self.inner.commit(),
        }
    }

    fn rollback(self) -> TaskStoreResult<()> {
        self.inner.rollback()
    }
}

#[async_trait]
impl TaskStore for FaultyStore {
    type Transaction = FaultyTransaction;

    fn begin_evaluation(&self) -> TaskStoreResult<Self::Transaction> {
        Ok(FaultyTransaction {
            inner: self.inner.begin_evaluation()?,
            fault: self.fault,
        })
    }

    async fn insert(&self, task: &ScheduledTask) -> TaskStoreResult<()> {
        self.inner.insert(task).await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<FetchedTask>> {
        self.inner.find_by_id(id).await
    }

    async fn list(&self, offset: usize, limit: usize) -> TaskStoreResult<Vec<FetchedTask>> {
        self.inner.list(offset, limit).await
    }
}

struct FaultyHarness {
    store: Arc<FaultyStore>,
    queue: Arc<InMemoryWorkQueue>,
    clock: Arc<FixedClock>,
    cycle: BeatCycle<FaultyStore, InMemoryWorkQueue, FixedClock>,
}

impl FaultyHarness {
    fn new(fault: Fault, phase_one_timeout: Duration) -> Self {
        let clock = Arc::new(FixedClock::at(utc(2024, 6, 3, 9, 0, 0)));
        let store = Arc::new(FaultyStore {
            inner: InMemoryTaskStore::with_clock(Arc::clone(&clock)),
            fault,
        });
        let queue = Arc::new(InMemoryWorkQueue::new());
        let config = SchedulerConfig::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
            4,
            phase_one_timeout,
        )
        .expect("valid configuration");
        let context = SchedulerContext::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            Arc::clone(&clock),
            config,
        );
        Self {
            store,
            queue,
            clock,
            cycle: BeatCycle::new(context),
        }
    }

    async fn add(&self, task_name: &str, schedule: Schedule) -> ScheduledTask {
        let task = ScheduledTask::new(
            task_name,
            email_workflow(),
            schedule,
            zone("UTC"),
            &*self.clock,
        );
        self.store.insert(&task).await.expect("insert task");
        task
    }

    async fn stored(&self, task_id: TaskId) -> ScheduledTask {
        self.store
            .find_by_id(task_id)
            .await
            .expect("lookup")
            .expect("task exists")
            .expect("decodable task")
    }

    fn published(&self) -> usize {
        self.queue.published().expect("queue log").len()
    }
}

#[rstest]
#[case::fetch(Fault::FailFetch)]
#[case::apply(Fault::FailApply)]
#[case::commit(Fault::FailCommit)]
#[tokio::test(flavor = "multi_thread")]
async fn store_failure_inside_the_transaction_persists_and_publishes_nothing(
    #[case] fault: Fault,
) {
    let harness = FaultyHarness::new(fault, Duration::from_secs(30));
    let hourly = harness
        .add(
            "hourly",
            Schedule::interval(1, IntervalPeriod::Hours).expect("positive"),
        )
        .await;
    let launch = harness
        .add("launch", Schedule::at(local(2024, 6, 1, 8, 0)))
        .await;

    let result = harness.cycle.run().await;

    assert!(matches!(result, Err(CycleError::Store(_))), "{result:?}");
    assert_eq!(harness.stored(hourly.id()).await, hourly);
    assert_eq!(harness.stored(launch.id()).await, launch);
    assert_eq!(harness.published(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn timeout_before_commit_rolls_back_and_reports_the_bound() {
    let timeout = Duration::from_millis(100);
    let harness = FaultyHarness::new(Fault::SlowFetch(Duration::from_millis(300)), timeout);
    let launch = harness
        .add("launch", Schedule::at(local(2024, 6, 1, 8, 0)))
        .await;

    let result = harness.cycle.run().await;

    assert!(
        matches!(result, Err(CycleError::TimedOut(bound)) if bound == timeout),
        "{result:?}"
    );
    assert!(harness.stored(launch.id()).await.is_active());
    assert_eq!(harness.published(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn commit_that_outlasts_the_timeout_is_still_dispatched() {
    let harness = FaultyHarness::new(
        Fault::SlowCommit(Duration::from_millis(300)),
        Duration::from_millis(100),
    );
    let launch = harness
        .add("launch", Schedule::at(local(2024, 6, 1, 8, 0)))
        .await;

    let report = harness.cycle.run().await.expect("late commit is reported");

    assert_eq!(report.evaluation.due.len(), 1);
    assert_eq!(report.dispatch.published.len(), 1);
    assert!(!harness.stored(launch.id()).await.is_active());
    assert_eq!(harness.published(), 1);
}
