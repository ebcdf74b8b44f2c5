//! Periodic update timer.
//!
//! [`PeriodicScheduler`] runs a tokio interval on a dedicated OS thread with
//! its own current-thread runtime, so expiries are independent of the host
//! application's threads and of the script worker. Every expiry invokes a
//! callback (the tick coordinator), which must not block.
//!
//! The live interval is held in an [`IntervalControl`]. Retuning writes the
//! new interval; the timer task notices, drops its old interval and starts a
//! fresh one whose first expiry is one full new period later.

use crate::error::{AutosplitError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest interval the timer runs at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Longest interval the timer runs at.
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Convert a refresh rate (ticks per second) into a timer interval.
///
/// `round(1000 / rate)` milliseconds, clamped to
/// [`MIN_INTERVAL`]..=[`MAX_INTERVAL`]. Returns `None` for non-finite or
/// non-positive rates.
pub fn interval_for_rate(rate: f64) -> Option<Duration> {
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    let millis = (1000.0 / rate).round().clamp(
        MIN_INTERVAL.as_millis() as f64,
        MAX_INTERVAL.as_millis() as f64,
    );
    Some(Duration::from_millis(millis as u64))
}

fn clamp_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_INTERVAL, MAX_INTERVAL)
}

// ── Interval control ─────────────────────────────────────────────────────────

/// Shared handle to the timer's live interval.
///
/// Clones write to the same cell; the timer task is the only reader that
/// acts on changes.
#[derive(Debug, Clone)]
pub struct IntervalControl {
    tx: Arc<watch::Sender<Duration>>,
}

impl IntervalControl {
    pub fn new(initial: Duration) -> Self {
        let (tx, _rx) = watch::channel(clamp_interval(initial));
        Self { tx: Arc::new(tx) }
    }

    /// The interval currently in effect.
    pub fn current(&self) -> Duration {
        *self.tx.borrow()
    }

    /// Set a new interval. Setting the current value again is a no-op and
    /// does not restart the timer.
    pub fn retune(&self, interval: Duration) {
        let interval = clamp_interval(interval);
        let changed = self.tx.send_if_modified(|current| {
            if *current == interval {
                false
            } else {
                *current = interval;
                true
            }
        });
        if changed {
            debug!(interval_ms = interval.as_millis() as u64, "update interval retuned");
        }
    }

    /// Retune from a refresh rate. Invalid rates are logged and ignored.
    ///
    /// Returns the interval applied, if any.
    pub fn retune_to_rate(&self, rate: f64) -> Option<Duration> {
        match interval_for_rate(rate) {
            Some(interval) => {
                self.retune(interval);
                Some(interval)
            }
            None => {
                warn!(rate, "ignoring invalid script refresh rate");
                None
            }
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Duration> {
        self.tx.subscribe()
    }
}

// ── Scheduler ────────────────────────────────────────────────────────────────

/// High-resolution periodic trigger on its own thread.
pub struct PeriodicScheduler {
    control: IntervalControl,
    cancel: CancellationToken,
    runtime: Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl PeriodicScheduler {
    /// Start the timer thread. `on_expiry` runs on that thread for every
    /// expiry and must return promptly.
    ///
    /// # Errors
    ///
    /// Returns [`AutosplitError::Scheduler`] if the runtime or thread cannot
    /// be created.
    pub fn start<F>(control: IntervalControl, on_expiry: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AutosplitError::Scheduler(format!("failed to create timer runtime: {e}")))?;
        let handle = runtime.handle().clone();
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let interval_rx = control.subscribe();
        let thread = std::thread::Builder::new()
            .name("autosplit-timer".to_owned())
            .spawn(move || {
                runtime.block_on(run_timer(interval_rx, task_cancel, on_expiry));
            })
            .map_err(|e| AutosplitError::Scheduler(format!("failed to spawn timer thread: {e}")))?;

        Ok(Self {
            control,
            cancel,
            runtime: handle,
            thread: Some(thread),
        })
    }

    /// Handle to the timer runtime, used for deferred work such as the
    /// file-change debounce.
    pub fn runtime_handle(&self) -> Handle {
        self.runtime.clone()
    }

    pub fn control(&self) -> &IntervalControl {
        &self.control
    }

    /// Stop the timer and join its thread. Idempotent.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("update timer thread panicked");
        }
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn new_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run_timer<F>(
    mut interval_rx: watch::Receiver<Duration>,
    cancel: CancellationToken,
    mut on_expiry: F,
) where
    F: FnMut(),
{
    let mut period = *interval_rx.borrow_and_update();
    let mut ticker = new_ticker(period);
    info!(interval_ms = period.as_millis() as u64, "update timer started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    debug!("interval control dropped; stopping timer");
                    break;
                }
                period = *interval_rx.borrow_and_update();
                ticker = new_ticker(period);
                debug!(interval_ms = period.as_millis() as u64, "update timer restarted");
            }
            _ = ticker.tick() => on_expiry(),
        }
    }

    info!("update timer stopped");
}
