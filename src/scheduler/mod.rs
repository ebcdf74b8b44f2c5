//! Periodic scheduling of script evaluation ticks.

pub mod coordinator;
pub mod timer;

pub(crate) use coordinator::Job;
pub use coordinator::{TickCoordinator, TickGuard, TickOutcome, TickPermit, TickStats};
pub use timer::{IntervalControl, MAX_INTERVAL, MIN_INTERVAL, PeriodicScheduler, interval_for_rate};
