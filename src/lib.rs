//! Autosplit: update scheduler and hot-reloading script host for
//! auto-splitter scripts.
//!
//! A loaded script inspects host state (typically a game's process memory)
//! on every tick and drives timer splitting decisions. This crate owns
//! everything around the script:
//!
//! - **Periodic scheduler**: a tokio interval on its own thread whose cadence
//!   follows the refresh rate the script asks for
//! - **Single-flight coordinator**: drops expiries while a tick is running so
//!   evaluations never overlap
//! - **Debounced watcher**: turns bursts of file edits into one reload
//! - **Lifecycle container**: load, startup, update and shutdown with every
//!   script failure contained
//!
//! The script language itself is pluggable through [`script::ScriptParser`];
//! [`script::ManifestParser`] is a declarative stand-in for dry runs.

pub mod component;
pub mod config;
pub mod error;
pub mod factory;
pub mod scheduler;
pub mod script;
pub mod settings;
pub mod watcher;

pub use component::{AutoSplitComponent, ScriptChanged};
pub use config::AutosplitConfig;
pub use error::{AutosplitError, Result};
pub use factory::{ComponentCategory, ComponentFactory};
pub use script::{LifecycleState, Script, ScriptError, ScriptEvents, ScriptParser, ScriptVariables};
pub use settings::{ComponentSettings, ScriptSetting, ScriptSettings};
