//! Single-flight tick coordination.
//!
//! Every timer expiry calls [`TickCoordinator::fire`]. The coordinator tries
//! to take the one-permit [`TickGuard`] without waiting; if a previous tick
//! still holds it the expiry is dropped. Otherwise the permit is sent along
//! with a [`Job::Tick`] to the serialized script worker and released when
//! the worker finishes with it, so ticks can never overlap and there is never
//! more than one tick queued.

use crate::script::ScriptVariables;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tracing::{trace, warn};

/// Work items for the serialized script worker.
#[derive(Debug)]
pub(crate) enum Job {
    /// Run one tick; the guard is released when the permit drops.
    Tick(TickPermit),
    /// Report the running script's variables.
    Variables(oneshot::Sender<Option<ScriptVariables>>),
    /// Unload the script and stop the worker.
    Dispose,
}

/// Proof that the holder owns the tick guard.
#[derive(Debug)]
pub struct TickPermit {
    _permit: OwnedSemaphorePermit,
}

/// Binary exclusion token allowing at most one in-flight tick.
#[derive(Debug, Clone)]
pub struct TickGuard {
    semaphore: Arc<Semaphore>,
}

impl Default for TickGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl TickGuard {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Take the guard if it is free. Never blocks.
    pub fn try_acquire(&self) -> Option<TickPermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| TickPermit { _permit: permit })
    }

    /// Whether a tick currently holds the guard.
    pub fn is_held(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}

/// What happened to one timer expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick was handed to the worker.
    Dispatched,
    /// A previous tick was still running; this expiry was discarded.
    Dropped,
    /// The worker has stopped.
    Closed,
}

/// Counters for dispatched and dropped expiries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Expiries handed to the worker.
    pub dispatched: u64,
    /// Expiries discarded because the guard was held.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct TickCounters {
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

/// Gatekeeper between the timer and the script worker.
#[derive(Debug, Clone)]
pub struct TickCoordinator {
    guard: TickGuard,
    jobs: mpsc::UnboundedSender<Job>,
    counters: Arc<TickCounters>,
}

impl TickCoordinator {
    pub(crate) fn new(jobs: mpsc::UnboundedSender<Job>) -> Self {
        Self {
            guard: TickGuard::new(),
            jobs,
            counters: Arc::new(TickCounters::default()),
        }
    }

    /// Handle one timer expiry.
    pub fn fire(&self) -> TickOutcome {
        let Some(permit) = self.guard.try_acquire() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("previous tick still running; expiry dropped");
            return TickOutcome::Dropped;
        };

        if self.jobs.send(Job::Tick(permit)).is_err() {
            warn!("script worker stopped; tick not dispatched");
            return TickOutcome::Closed;
        }
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        TickOutcome::Dispatched
    }

    pub fn stats(&self) -> TickStats {
        TickStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn guard(&self) -> &TickGuard {
        &self.guard
    }
}
