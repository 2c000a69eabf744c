//! Schedulers sharing one task store must not double-fire stateful tasks.

use super::helpers::{MemoryStore, cycle, queue, register_overdue_one_shots, store};
use rstest::rstest;
use std::collections::HashSet;
use std::sync::Arc;
use taskbeat::scheduler::{adapters::memory::InMemoryWorkQueue, ports::TaskStore};

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_cycles_dispatch_each_one_shot_once(
    store: Arc<MemoryStore>,
    queue: Arc<InMemoryWorkQueue>,
) -> eyre::Result<()> {
    register_overdue_one_shots(&store, 5).await?;
    let first = cycle(&store, &queue)?;
    let second = cycle(&store, &queue)?;

    let (left, right) = tokio::join!(first.run(), second.run());
    let (left, right) = (left?, right?);

    let due = left.evaluation.due.len() + right.evaluation.due.len();
    eyre::ensure!(due == 5, "expected 5 due tasks across both cycles, got {due}");
    let published = queue.published()?;
    let distinct: HashSet<_> = published.iter().map(|occurrence| occurrence.task_id).collect();
    eyre::ensure!(
        published.len() == 5 && distinct.len() == 5,
        "each task should be published exactly once"
    );

    let page = store.list(0, 10).await?;
    for row in page {
        eyre::ensure!(!row?.is_active(), "one-shot tasks should be deactivated");
    }
    Ok(())
}
