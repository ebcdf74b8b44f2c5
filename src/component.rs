//! The auto-splitter component exposed to the host application.
//!
//! [`AutoSplitComponent`] wires the periodic scheduler, the single-flight
//! tick coordinator, the debounced file watcher and the script lifecycle
//! together:
//!
//! ```text
//! autosplit-timer ──fire()──▶ TickCoordinator ──Job::Tick──▶ autosplit-script
//!        ▲                                                      │
//!        └──────────── IntervalControl::retune ◀────────────────┘
//! notify thread ──▶ Debouncer (timer runtime) ──▶ ReloadSignal ──▶ next tick
//! ```
//!
//! The script worker thread owns the host state, the lifecycle container and
//! the parser. Everything that touches the script runs there, one job at a
//! time. Construction starts the timer; [`dispose`](AutoSplitComponent::dispose)
//! (or drop) stops it, unloads the script and joins both threads.

use crate::config::AutosplitConfig;
use crate::error::{AutosplitError, Result};
use crate::scheduler::{IntervalControl, Job, PeriodicScheduler, TickCoordinator, TickStats};
use crate::script::{LifecycleState, ScriptLifecycle, ScriptParser, ScriptVariables};
use crate::settings::ComponentSettings;
use crate::watcher::{Debouncer, ReloadSignal, ScriptWatcher};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Notification that the script slot changed (reloaded, unloaded or disposed).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptChanged {
    /// Path of the script now loaded, if any.
    pub path: Option<PathBuf>,
    /// Lifecycle state after the change.
    pub state: LifecycleState,
    /// Refresh rate of the loaded script, if any.
    pub refresh_rate: Option<f64>,
}

/// Periodically evaluates a hot-reloadable script against host state `S`.
pub struct AutoSplitComponent {
    settings: ComponentSettings,
    changes: broadcast::Sender<ScriptChanged>,
    status: watch::Receiver<ScriptChanged>,
    coordinator: TickCoordinator,
    control: IntervalControl,
    reload: ReloadSignal,
    scheduler: Option<PeriodicScheduler>,
    jobs: mpsc::UnboundedSender<Job>,
    worker: Option<JoinHandle<()>>,
}

impl AutoSplitComponent {
    /// Create a component with settings restored from `config` and start
    /// its timer. The configured script, if any, loads on the first tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer or worker thread cannot be started.
    pub fn new<S, P>(state: S, parser: P, config: &AutosplitConfig) -> Result<Self>
    where
        S: Send + 'static,
        P: ScriptParser<S>,
    {
        let settings = ComponentSettings::from_snapshot(config.component.clone());
        Self::with_settings(state, parser, settings, config)
    }

    /// Create a component around an existing settings handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the timer or worker thread cannot be started.
    pub fn with_settings<S, P>(
        state: S,
        parser: P,
        settings: ComponentSettings,
        config: &AutosplitConfig,
    ) -> Result<Self>
    where
        S: Send + 'static,
        P: ScriptParser<S>,
    {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let (status_tx, status) = watch::channel(ScriptChanged::default());
        let coordinator = TickCoordinator::new(jobs_tx.clone());
        let control = IntervalControl::new(config.scheduler.default_interval());
        let reload = ReloadSignal::new();

        let timer_side = coordinator.clone();
        let scheduler = PeriodicScheduler::start(control.clone(), move || {
            timer_side.fire();
        })?;

        let debouncer = Debouncer::new(
            config.watcher.debounce(),
            reload.clone(),
            scheduler.runtime_handle(),
        );
        let watch_enabled = config.watcher.enabled;
        let worker_settings = settings.clone();
        let worker_control = control.clone();
        let worker_reload = reload.clone();
        let worker_changes = changes.clone();

        let worker = std::thread::Builder::new()
            .name("autosplit-script".to_owned())
            .spawn(move || {
                // Built here so the script objects it creates never leave
                // this thread.
                let lifecycle = ScriptLifecycle::new(
                    Box::new(parser),
                    ScriptWatcher::new(debouncer, watch_enabled),
                    worker_settings.clone(),
                    worker_control,
                );
                UpdateWorker {
                    state,
                    lifecycle,
                    settings: worker_settings,
                    reload: worker_reload,
                    changes: worker_changes,
                    status: status_tx,
                    last_path: None,
                }
                .run(jobs_rx);
            })
            .map_err(|e| AutosplitError::Runtime(format!("failed to spawn script worker: {e}")))?;

        info!(
            interval_ms = control.current().as_millis() as u64,
            hot_reload = watch_enabled,
            "auto-splitter component started"
        );

        Ok(Self {
            settings,
            changes,
            status,
            coordinator,
            control,
            reload,
            scheduler: Some(scheduler),
            jobs: jobs_tx,
            worker: Some(worker),
        })
    }

    /// Shared settings handle. Path changes apply on the next tick.
    pub fn settings(&self) -> &ComponentSettings {
        &self.settings
    }

    /// Convenience for `settings().set_script_path(path)`.
    pub fn set_script_path(&self, path: impl AsRef<Path>) {
        self.settings.set_script_path(path.as_ref());
    }

    /// Subscribe to script-changed notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ScriptChanged> {
        self.changes.subscribe()
    }

    /// The most recent script-changed notification.
    pub fn status(&self) -> ScriptChanged {
        self.status.borrow().clone()
    }

    pub fn tick_stats(&self) -> TickStats {
        self.coordinator.stats()
    }

    /// The timer interval currently in effect.
    pub fn interval(&self) -> Duration {
        self.control.current()
    }

    /// Variables of the running script, read on the worker after any tick
    /// in progress. `None` when no script is running.
    pub async fn variables(&self) -> Option<ScriptVariables> {
        let (tx, rx) = oneshot::channel();
        self.jobs.send(Job::Variables(tx)).ok()?;
        rx.await.ok().flatten()
    }

    /// Blocking form of [`variables`](Self::variables). Panics if called
    /// from within an async runtime.
    pub fn variables_blocking(&self) -> Option<ScriptVariables> {
        let (tx, rx) = oneshot::channel();
        self.jobs.send(Job::Variables(tx)).ok()?;
        rx.blocking_recv().ok().flatten()
    }

    /// Force a reload of the configured script on the next tick.
    pub fn request_reload(&self) {
        self.reload.request();
    }

    /// Stop the timer, unload the script and join the worker.
    ///
    /// Blocks until the script's shutdown routine has run; call from a
    /// blocking context when inside an async runtime.
    pub fn dispose(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        if self.jobs.send(Job::Dispose).is_err() {
            debug!("script worker already stopped");
        }
        if worker.join().is_err() {
            warn!("script worker thread panicked");
        }
        info!("auto-splitter component disposed");
    }
}

impl Drop for AutoSplitComponent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Script worker ────────────────────────────────────────────────────────────

struct UpdateWorker<S> {
    state: S,
    lifecycle: ScriptLifecycle<S>,
    settings: ComponentSettings,
    reload: ReloadSignal,
    changes: broadcast::Sender<ScriptChanged>,
    status: watch::Sender<ScriptChanged>,
    last_path: Option<PathBuf>,
}

impl<S: 'static> UpdateWorker<S> {
    fn run(mut self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        debug!("script worker started");
        while let Some(job) = jobs.blocking_recv() {
            match job {
                Job::Tick(permit) => {
                    self.tick();
                    drop(permit);
                }
                Job::Variables(reply) => {
                    if reply.send(self.lifecycle.variables()).is_err() {
                        trace!("variable query abandoned");
                    }
                }
                Job::Dispose => break,
            }
        }
        self.dispose();
        debug!("script worker stopped");
    }

    fn tick(&mut self) {
        let configured = self.settings.script_path();
        let requested = self.reload.take();

        if requested || configured != self.last_path {
            debug!(
                path = ?configured,
                requested,
                "reloading script"
            );
            self.last_path = configured;
            self.lifecycle
                .reload(self.last_path.as_deref(), &mut self.state);
            self.publish_change();
        }

        self.lifecycle.evaluate(&mut self.state);
    }

    fn dispose(&mut self) {
        self.lifecycle.cleanup(&mut self.state);
        self.lifecycle.deactivate_watcher();
        self.publish_change();
    }

    fn publish_change(&self) {
        let change = ScriptChanged {
            path: self.lifecycle.script_path().map(Path::to_path_buf),
            state: self.lifecycle.state(),
            refresh_rate: self.lifecycle.refresh_rate(),
        };
        self.status.send_replace(change.clone());
        if self.changes.send(change).is_err() {
            trace!("no script-changed subscribers");
        }
    }
}
