//! Beat loop lifecycle tests.

use super::helpers::{MemoryStore, cycle, queue, register_hourly, store};
use async_trait::async_trait;
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use taskbeat::scheduler::{
    adapters::memory::{InMemoryEvaluationTransaction, InMemoryWorkQueue},
    domain::{ScheduledTask, TaskId},
    ports::{FetchedTask, TaskStore, TaskStoreError, TaskStoreResult},
    services::{BeatLoop, BeatState},
};
use tokio_util::sync::CancellationToken;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_loop_exits_without_running_a_cycle(
    store: Arc<MemoryStore>,
    queue: Arc<InMemoryWorkQueue>,
) -> eyre::Result<()> {
    register_hourly(&store, 1).await?;
    let beat = BeatLoop::new(cycle(&store, &queue)?);
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(5), beat.run(shutdown)).await?;

    eyre::ensure!(queue.published()?.is_empty(), "no cycle should have run");
    eyre::ensure!(beat.state() == BeatState::Idle, "loop should be idle");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn first_tick_runs_immediately_and_shutdown_stops_the_loop(
    store: Arc<MemoryStore>,
    queue: Arc<InMemoryWorkQueue>,
) -> eyre::Result<()> {
    register_hourly(&store, 3).await?;
    let beat = Arc::new(BeatLoop::new(cycle(&store, &queue)?));
    let shutdown = CancellationToken::new();

    let running = {
        let beat = Arc::clone(&beat);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { beat.run(shutdown).await })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.published().map_or(0, |published| published.len()) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), running).await??;

    let published = queue.published()?;
    eyre::ensure!(published.len() == 3, "expected 3 occurrences, got {}", published.len());
    eyre::ensure!(
        published.iter().all(|occurrence| occurrence.chain.len() == 2),
        "every chain should carry both workflow steps"
    );
    Ok(())
}

/// Store whose evaluation transactions can never be opened.
struct UnavailableStore {
    attempts: AtomicUsize,
}

#[async_trait]
impl TaskStore for UnavailableStore {
    type Transaction = InMemoryEvaluationTransaction<DefaultClock>;

    fn begin_evaluation(&self) -> TaskStoreResult<Self::Transaction> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TaskStoreError::persistence(std::io::Error::other(
            "database unreachable",
        )))
    }

    async fn insert(&self, task: &ScheduledTask) -> TaskStoreResult<()> {
        Err(TaskStoreError::DuplicateTask(task.id()))
    }

    async fn find_by_id(&self, _id: TaskId) -> TaskStoreResult<Option<FetchedTask>> {
        Ok(None)
    }

    async fn list(&self, _offset: usize, _limit: usize) -> TaskStoreResult<Vec<FetchedTask>> {
        Ok(Vec::new())
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failing_cycles_do_not_stop_the_loop(queue: Arc<InMemoryWorkQueue>) -> eyre::Result<()> {
    let store = Arc::new(UnavailableStore {
        attempts: AtomicUsize::new(0),
    });
    let beat = BeatLoop::new(cycle(&store, &queue)?);
    let states = beat.subscribe();

    let first = beat.tick().await;
    let second = beat.tick().await;

    eyre::ensure!(first.is_none() && second.is_none(), "cycles should fail");
    eyre::ensure!(
        store.attempts.load(Ordering::SeqCst) == 2,
        "each tick should attempt a new transaction"
    );
    eyre::ensure!(*states.borrow() == BeatState::Idle, "loop should be idle");
    Ok(())
}
