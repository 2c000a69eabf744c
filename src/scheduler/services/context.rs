//! Explicit collaborators shared by every beat cycle.

use crate::config::SchedulerConfig;
use crate::scheduler::ports::{TaskStore, WorkQueue};
use mockable::Clock;
use std::sync::Arc;

/// Store, queue, clock, and configuration for one scheduler instance.
///
/// Constructed once at startup and cloned into each cycle; there is no
/// process-wide state.
pub struct SchedulerContext<S, Q, C>
where
    S: TaskStore,
    Q: WorkQueue,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    queue: Arc<Q>,
    clock: Arc<C>,
    config: SchedulerConfig,
}

impl<S, Q, C> SchedulerContext<S, Q, C>
where
    S: TaskStore,
    Q: WorkQueue,
    C: Clock + Send + Sync,
{
    /// Creates a context from its collaborators.
    #[must_use]
    pub const fn new(store: Arc<S>, queue: Arc<Q>, clock: Arc<C>, config: SchedulerConfig) -> Self {
        Self {
            store,
            queue,
            clock,
            config,
        }
    }

    /// Returns the task store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the work queue.
    #[must_use]
    pub const fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Returns the clock.
    #[must_use]
    pub const fn clock(&self) -> &Arc<C> {
        &self.clock
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }
}

impl<S, Q, C> Clone for SchedulerContext<S, Q, C>
where
    S: TaskStore,
    Q: WorkQueue,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
            clock: Arc::clone(&self.clock),
            config: self.config,
        }
    }
}
