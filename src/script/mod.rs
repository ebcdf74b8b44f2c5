//! Script collaborator contracts.
//!
//! The host never interprets script source itself. A [`ScriptParser`] turns
//! source text into a [`Script`] object, and the [`lifecycle`] container
//! drives that object through startup, per-tick updates and shutdown.
//!
//! Scripts report changes back to the host through [`ScriptEvents`], a typed
//! channel drained by the serialized worker after every script call. Each
//! loaded script gets a fresh channel, so events from a script that has been
//! unloaded can never reach its successor.
//!
//! Script objects are created, called and dropped on the worker thread only,
//! so [`Script`] implementations do not need to be `Send`. Companion
//! components read a running script's state through [`Script::variables`],
//! which the worker queries on their behalf.

pub mod error;
pub mod lifecycle;
pub mod manifest;

pub use error::{ScriptError, ScriptPhase};
pub use lifecycle::{LifecycleState, ScriptLifecycle};
pub use manifest::{ManifestParser, ManifestScript};

use crate::settings::ScriptSettings;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Display snapshot of a script's state variables, keyed by name.
pub type ScriptVariables = BTreeMap<String, String>;

/// Notification emitted by a running script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptEvent {
    /// The script wants to be updated `rate` times per second.
    RefreshRateChanged(f64),
    /// The script detected a game version.
    GameVersionChanged(String),
}

/// Sending side of a script's event channel, handed to the script on load.
#[derive(Debug, Clone)]
pub struct ScriptEvents {
    tx: mpsc::UnboundedSender<ScriptEvent>,
}

impl ScriptEvents {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<ScriptEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Announce a new refresh rate (ticks per second).
    pub fn refresh_rate_changed(&self, rate: f64) {
        self.emit(ScriptEvent::RefreshRateChanged(rate));
    }

    /// Announce the detected game version.
    pub fn game_version_changed(&self, version: impl Into<String>) {
        self.emit(ScriptEvent::GameVersionChanged(version.into()));
    }

    fn emit(&self, event: ScriptEvent) {
        // The receiver is gone once the script has been unloaded.
        if self.tx.send(event).is_err() {
            tracing::trace!("script event dropped; script no longer loaded");
        }
    }
}

/// A compiled script, generic over the host state it inspects.
pub trait Script<S> {
    /// Refresh rate declared by the script at load time, in ticks per second.
    fn refresh_rate(&self) -> f64;

    /// Receive the event channel for this load. Called once, before startup.
    fn attach(&mut self, events: ScriptEvents);

    /// Run the startup routine and return the script's settings descriptor.
    fn run_startup(&mut self, state: &mut S) -> Result<ScriptSettings, ScriptError>;

    /// Run the shutdown routine.
    fn run_shutdown(&mut self, state: &mut S) -> Result<(), ScriptError>;

    /// Run one evaluation tick.
    fn update(&mut self, state: &mut S) -> Result<(), ScriptError>;

    /// Current values of the script's variables, for variable viewers.
    fn variables(&self) -> ScriptVariables {
        ScriptVariables::new()
    }
}

/// Turns script source text into a [`Script`].
///
/// The parser is moved onto the worker thread, hence `Send`.
pub trait ScriptParser<S>: Send + 'static {
    /// Parse `source` into a script object.
    fn parse(&self, source: &str) -> Result<Box<dyn Script<S>>, ScriptError>;
}
