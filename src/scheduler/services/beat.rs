//! Periodic driver that runs one beat cycle per cadence tick.

use super::cycle::{BeatCycle, CycleReport};
use crate::scheduler::ports::{TaskStore, WorkQueue};
use mockable::Clock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Whether a cycle is currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatState {
    /// Waiting for the next tick.
    Idle,
    /// A cycle is running.
    Running,
}

/// Drives [`BeatCycle`]s at a fixed cadence until shut down.
///
/// Cycles never overlap: a tick that arrives while a cycle runs is skipped.
/// A failed or panicking cycle is logged and the loop waits for the next
/// tick.
pub struct BeatLoop<S, Q, C>
where
    S: TaskStore,
    Q: WorkQueue,
    C: Clock + Send + Sync,
{
    cycle: BeatCycle<S, Q, C>,
    state: watch::Sender<BeatState>,
}

impl<S, Q, C> BeatLoop<S, Q, C>
where
    S: TaskStore + 'static,
    Q: WorkQueue + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates an idle loop around `cycle`.
    #[must_use]
    pub fn new(cycle: BeatCycle<S, Q, C>) -> Self {
        let (state, _) = watch::channel(BeatState::Idle);
        Self { cycle, state }
    }

    /// Subscribes to idle/running transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BeatState> {
        self.state.subscribe()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> BeatState {
        *self.state.borrow()
    }

    /// Ticks until `shutdown` is cancelled. The first cycle runs immediately.
    pub async fn run(&self, shutdown: CancellationToken) {
        let cadence = self.cycle.context().config().cadence();
        let mut ticker = tokio::time::interval(cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(cadence = ?cadence, "beat loop started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick().await;
        }

        info!("beat loop stopped");
    }

    /// Runs a single cycle in its own task so a panic cannot escape.
    ///
    /// Returns the report of a successful cycle.
    pub async fn tick(&self) -> Option<CycleReport> {
        self.state.send_replace(BeatState::Running);
        let cycle = self.cycle.clone();
        let joined = tokio::spawn(async move { cycle.run().await }).await;
        self.state.send_replace(BeatState::Idle);

        match joined {
            Ok(Ok(report)) => Some(report),
            Ok(Err(cycle_error)) => {
                error!(error = %cycle_error, "beat cycle failed");
                None
            }
            Err(join_error) => {
                error!(error = %join_error, "beat cycle panicked");
                None
            }
        }
    }
}
