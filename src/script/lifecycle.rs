//! Script lifecycle container.
//!
//! Owns the loaded script (if any) and drives it through a strict state
//! machine:
//!
//! ```text
//! Unloaded → Loaded → Running
//!    ↑          │         │
//!    └──────────┴─────────┘   (cleanup)
//! ```
//!
//! `Loaded` only exists between a successful parse and the end of the
//! startup call inside one [`reload`](ScriptLifecycle::reload); callers only
//! ever observe `Unloaded` or `Running`.
//!
//! Every call into script code is isolated: error returns and panics are
//! logged and folded into the state machine, never propagated. Cleanup
//! drops the script even when its shutdown routine fails.

use super::error::{ScriptError, ScriptPhase};
use super::{Script, ScriptEvent, ScriptEvents, ScriptParser, ScriptVariables};
use crate::scheduler::IntervalControl;
use crate::settings::ComponentSettings;
use crate::watcher::ScriptWatcher;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// ── State enum ───────────────────────────────────────────────────────────────

/// Lifecycle state of the script slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleState {
    /// No script object exists.
    #[default]
    Unloaded,
    /// The script parsed successfully; startup has not completed.
    Loaded,
    /// Startup completed; the script is evaluated every tick.
    Running,
}

impl LifecycleState {
    /// Returns `true` if a transition from `self` to `target` is valid.
    ///
    /// - `Unloaded → Loaded`
    /// - `Loaded → Running | Unloaded`
    /// - `Running → Unloaded`
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Unloaded, Self::Loaded)
                | (Self::Loaded, Self::Running)
                | (Self::Loaded, Self::Unloaded)
                | (Self::Running, Self::Unloaded)
        )
    }

    /// Whether a script object exists in this state.
    pub fn has_script(self) -> bool {
        !matches!(self, Self::Unloaded)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Running => "running",
        };
        f.write_str(label)
    }
}

// ── Script handle ────────────────────────────────────────────────────────────

struct ScriptHandle<S> {
    script: Box<dyn Script<S>>,
    /// Last rate the scheduler accepted; `None` if the script never
    /// declared a usable one.
    refresh_rate: Option<f64>,
    path: PathBuf,
    events: mpsc::UnboundedReceiver<ScriptEvent>,
}

/// Run one script entry point, turning a panic into a [`ScriptError`].
fn guarded<T>(
    phase: ScriptPhase,
    call: impl FnOnce() -> Result<T, ScriptError>,
) -> Result<T, ScriptError> {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            Err(ScriptError::Panicked { phase, message })
        }
    }
}

// ── Lifecycle container ──────────────────────────────────────────────────────

/// Owns the current script and its load/start/run/shutdown state machine.
///
/// Must only be driven from the serialized worker context.
pub struct ScriptLifecycle<S> {
    parser: Box<dyn ScriptParser<S>>,
    watcher: ScriptWatcher,
    settings: ComponentSettings,
    interval: IntervalControl,
    current: Option<ScriptHandle<S>>,
    state: LifecycleState,
}

impl<S: 'static> ScriptLifecycle<S> {
    pub fn new(
        parser: Box<dyn ScriptParser<S>>,
        watcher: ScriptWatcher,
        settings: ComponentSettings,
        interval: IntervalControl,
    ) -> Self {
        Self {
            parser,
            watcher,
            settings,
            interval,
            current: None,
            state: LifecycleState::Unloaded,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Path of the loaded script, if any.
    pub fn script_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|h| h.path.as_path())
    }

    /// Refresh rate the loaded script currently asks for.
    pub fn refresh_rate(&self) -> Option<f64> {
        self.current.as_ref().and_then(|h| h.refresh_rate)
    }

    /// Variables of the running script. `None` unless running, or when the
    /// script panics while reporting them.
    pub fn variables(&self) -> Option<ScriptVariables> {
        if self.state != LifecycleState::Running {
            return None;
        }
        let handle = self.current.as_ref()?;
        match guarded(ScriptPhase::Inspect, || Ok(handle.script.variables())) {
            Ok(variables) => Some(variables),
            Err(e) => {
                warn!(error = %e, "script variable query failed");
                None
            }
        }
    }

    pub fn watcher(&self) -> &ScriptWatcher {
        &self.watcher
    }

    /// Replace the current script with the one at `path`.
    ///
    /// `None` (or an empty path) unloads the script and stops watching.
    pub fn reload(&mut self, path: Option<&Path>, host: &mut S) {
        self.cleanup(host);

        let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
            self.watcher.deactivate();
            info!("script path cleared");
            return;
        };

        self.load(path, host);
    }

    fn load(&mut self, path: &Path, host: &mut S) {
        info!(path = %path.display(), "loading script");

        if let Err(e) = self.watcher.watch(path) {
            warn!(path = %path.display(), error = %e, "cannot watch script file; hot reload inactive");
        }

        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(source) => {
                let err = ScriptError::Read {
                    path: path.to_path_buf(),
                    source,
                };
                error!(error = %err, "script load failed");
                return;
            }
        };

        let parser = &self.parser;
        let mut script = match guarded(ScriptPhase::Parse, || parser.parse(&source)) {
            Ok(script) => script,
            Err(e) => {
                error!(path = %path.display(), error = %e, "script load failed");
                return;
            }
        };

        let (events, events_rx) = ScriptEvents::channel();
        script.attach(events);
        let declared_rate = script.refresh_rate();
        let refresh_rate = self
            .interval
            .retune_to_rate(declared_rate)
            .map(|_| declared_rate);
        self.current = Some(ScriptHandle {
            script,
            refresh_rate,
            path: path.to_path_buf(),
            events: events_rx,
        });
        self.transition(LifecycleState::Loaded);
        self.settings.set_game_version(None);

        let Some(handle) = self.current.as_mut() else {
            return;
        };
        match guarded(ScriptPhase::Startup, || handle.script.run_startup(host)) {
            Ok(declared) => {
                self.settings.set_script_settings(declared);
                self.transition(LifecycleState::Running);
                self.drain_events();
                info!(path = %path.display(), refresh_rate = ?refresh_rate, "script running");
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "script startup failed; unloading");
                self.cleanup(host);
            }
        }
    }

    /// Shut down and drop the current script. No-op when unloaded.
    ///
    /// The script is dropped even if its shutdown routine fails.
    pub fn cleanup(&mut self, host: &mut S) {
        let Some(mut handle) = self.current.take() else {
            return;
        };

        if let Err(e) = guarded(ScriptPhase::Shutdown, || handle.script.run_shutdown(host)) {
            error!(path = %handle.path.display(), error = %e, "script shutdown failed");
        }

        self.settings.set_game_version(None);
        self.settings.reset_script_settings();
        let path = handle.path.clone();
        drop(handle);
        self.transition(LifecycleState::Unloaded);
        info!(path = %path.display(), "script unloaded");
    }

    /// Run one update of the running script. No-op unless running.
    ///
    /// Failures are logged and leave the script loaded.
    pub fn evaluate(&mut self, host: &mut S) {
        if self.state != LifecycleState::Running {
            return;
        }
        let Some(handle) = self.current.as_mut() else {
            return;
        };

        if let Err(e) = guarded(ScriptPhase::Update, || handle.script.update(host)) {
            warn!(error = %e, "script update failed");
        }
        self.drain_events();
    }

    /// Stop watching the script file.
    pub fn deactivate_watcher(&mut self) {
        self.watcher.deactivate();
    }

    fn drain_events(&mut self) {
        let Some(handle) = self.current.as_mut() else {
            return;
        };
        while let Ok(event) = handle.events.try_recv() {
            match event {
                ScriptEvent::RefreshRateChanged(rate) => {
                    if self.interval.retune_to_rate(rate).is_some() {
                        handle.refresh_rate = Some(rate);
                    }
                }
                ScriptEvent::GameVersionChanged(version) => {
                    debug!(version = %version, "game version changed");
                    self.settings.set_game_version(Some(version));
                }
            }
        }
    }

    fn transition(&mut self, next: LifecycleState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid lifecycle transition {} -> {next}",
            self.state
        );
        debug!(from = %self.state, to = %next, "script lifecycle transition");
        self.state = next;
    }
}
