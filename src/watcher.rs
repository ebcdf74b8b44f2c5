//! Debounced script file watcher.
//!
//! [`ScriptWatcher`] observes the directory containing the configured script
//! through `notify` and forwards change notifications for the script file to
//! a [`Debouncer`]. The debouncer restarts a quiescence window on every
//! notification and, once the window elapses quietly, asserts the shared
//! [`ReloadSignal`] exactly once. The next scheduler tick consumes the signal
//! and reloads the script.
//!
//! # Design
//!
//! The delay is a task spawned on the scheduler's runtime, never a sleep on
//! the `notify` thread or the script worker. The reload signal is a single
//! atomic flag, so any number of bursts between two ticks still produce one
//! reload.
//!
//! Retargeting or deactivating the watcher closes the old subscription's
//! gate and cancels any open window, so edits to a file that is no longer
//! the target never request a reload.

use crate::error::{AutosplitError, Result};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

// ── Reload signal ────────────────────────────────────────────────────────────

/// Coalescing "reload pending" flag shared by producers and the worker.
#[derive(Debug, Clone, Default)]
pub struct ReloadSignal {
    pending: Arc<AtomicBool>,
}

impl ReloadSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a reload as pending. Idempotent.
    pub fn request(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether a reload was pending.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Whether a reload is pending, without clearing it.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

// ── Debouncer ────────────────────────────────────────────────────────────────

/// Trailing-edge debounce in front of a [`ReloadSignal`].
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    generation: Arc<AtomicU64>,
    fired: Arc<AtomicU64>,
    signal: ReloadSignal,
    runtime: Handle,
}

impl Debouncer {
    /// Create a debouncer whose delay tasks run on `runtime`.
    pub fn new(window: Duration, signal: ReloadSignal, runtime: Handle) -> Self {
        Self {
            window,
            generation: Arc::new(AtomicU64::new(0)),
            fired: Arc::new(AtomicU64::new(0)),
            signal,
            runtime,
        }
    }

    /// Record one change notification, restarting the quiescence window.
    ///
    /// Safe to call from any thread.
    pub fn notify(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let latest = Arc::clone(&self.generation);
        let fired = Arc::clone(&self.fired);
        let signal = self.signal.clone();
        let window = self.window;

        self.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if latest.load(Ordering::Acquire) == generation {
                fired.fetch_add(1, Ordering::Relaxed);
                signal.request();
                debug!("script file settled; reload requested");
            }
        });
    }

    /// Abandon any open window without asserting the signal.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of times the window elapsed and the signal was asserted.
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }
}

// ── Watch target ─────────────────────────────────────────────────────────────

/// Directory and file name currently observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    /// Directory watched (non-recursively).
    pub dir: PathBuf,
    /// File name within `dir` whose changes count.
    pub file_name: OsString,
}

impl WatchTarget {
    /// Split a script path into directory and file name.
    ///
    /// Returns `None` when the path has no file name component.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_os_string();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Some(Self { dir, file_name })
    }

    /// Whether an event path refers to the watched file.
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name() == Some(self.file_name.as_os_str())
    }
}

/// Whether a raw event kind counts as a content change or rename.
fn is_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

// ── Script watcher ───────────────────────────────────────────────────────────

struct ActiveWatch {
    target: WatchTarget,
    /// Open while this subscription may feed the debouncer.
    gate: Arc<Mutex<bool>>,
    _watcher: RecommendedWatcher,
}

/// Watches the configured script file and feeds a [`Debouncer`].
pub struct ScriptWatcher {
    debouncer: Debouncer,
    enabled: bool,
    active: Option<ActiveWatch>,
}

impl ScriptWatcher {
    /// Create an inactive watcher. When `enabled` is false, [`watch`](Self::watch)
    /// never subscribes and hot reload is off.
    pub fn new(debouncer: Debouncer, enabled: bool) -> Self {
        Self {
            debouncer,
            enabled,
            active: None,
        }
    }

    /// Retarget the watcher at `path` and activate it.
    ///
    /// Any previous subscription is dropped first, so on error the watcher
    /// is inactive.
    ///
    /// # Errors
    ///
    /// Returns [`AutosplitError::Watcher`] when the path has no file name or
    /// the OS subscription fails.
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        self.deactivate();
        if !self.enabled {
            debug!(path = %path.display(), "hot reload disabled; not watching script");
            return Ok(());
        }

        let target = WatchTarget::from_path(path).ok_or_else(|| {
            AutosplitError::Watcher(format!("no file name in {}", path.display()))
        })?;

        let filter = target.clone();
        let debouncer = self.debouncer.clone();
        let gate = Arc::new(Mutex::new(true));
        let callback_gate = Arc::clone(&gate);
        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if is_change(&event.kind) && event.paths.iter().any(|p| filter.matches(p)) {
                        let open = callback_gate.lock().unwrap_or_else(|e| e.into_inner());
                        if *open {
                            trace!(kind = ?event.kind, "script file changed");
                            debouncer.notify();
                        }
                    }
                }
                Err(e) => warn!(error = %e, "script watcher error"),
            },
        )?;
        watcher.watch(&target.dir, RecursiveMode::NonRecursive)?;

        debug!(
            dir = %target.dir.display(),
            file = ?target.file_name,
            "watching script file"
        );
        self.active = Some(ActiveWatch {
            target,
            gate,
            _watcher: watcher,
        });
        Ok(())
    }

    /// Stop watching and cancel any pending debounce window.
    pub fn deactivate(&mut self) {
        if let Some(active) = self.active.take() {
            *active.gate.lock().unwrap_or_else(|e| e.into_inner()) = false;
            debug!(dir = %active.target.dir.display(), "script watcher deactivated");
        }
        self.debouncer.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The currently observed target, if active.
    pub fn target(&self) -> Option<&WatchTarget> {
        self.active.as_ref().map(|a| &a.target)
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }
}
