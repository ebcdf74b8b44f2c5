//! Shared component settings.
//!
//! [`ComponentSettings`] is the surface shared between the host application
//! (settings UI, persistence) and the serialized script worker. It holds the
//! configured script path, the game version reported by the running script,
//! and the settings the script declared at startup together with the user's
//! chosen values.
//!
//! User values are keyed by setting id and survive script reloads: when a
//! script publishes its descriptor again, previously chosen values are
//! re-applied over the script's defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ── Script-defined settings ──────────────────────────────────────────────────

/// One boolean option declared by a script during startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSetting {
    /// Stable identifier used to persist the user's choice.
    pub id: String,
    /// Label shown in the settings UI.
    pub label: String,
    /// Value declared by the script.
    pub default_value: bool,
    /// Effective value (default, or the user's persisted choice).
    pub value: bool,
    /// Parent setting id for nested display, if any.
    #[serde(default)]
    pub parent: Option<String>,
    /// Tooltip text, if any.
    #[serde(default)]
    pub tooltip: Option<String>,
}

impl ScriptSetting {
    /// Create a top-level setting whose value starts at `default_value`.
    pub fn new(id: impl Into<String>, label: impl Into<String>, default_value: bool) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            default_value,
            value: default_value,
            parent: None,
            tooltip: None,
        }
    }

    /// Nest this setting under `parent`.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Attach tooltip text.
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }
}

/// Ordered settings descriptor returned by a script's startup routine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSettings {
    entries: Vec<ScriptSetting>,
}

impl ScriptSettings {
    /// An empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a setting, replacing any existing entry with the same id.
    pub fn push(&mut self, setting: ScriptSetting) {
        if let Some(existing) = self.entries.iter_mut().find(|s| s.id == setting.id) {
            *existing = setting;
        } else {
            self.entries.push(setting);
        }
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, setting: ScriptSetting) -> Self {
        self.push(setting);
        self
    }

    /// Look up a setting by id.
    pub fn get(&self, id: &str) -> Option<&ScriptSetting> {
        self.entries.iter().find(|s| s.id == id)
    }

    /// Effective value of the setting `id`.
    pub fn value(&self, id: &str) -> Option<bool> {
        self.get(id).map(|s| s.value)
    }

    /// Iterate settings in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ScriptSetting> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Persisted form ───────────────────────────────────────────────────────────

/// The persisted part of [`ComponentSettings`], stored under `[component]`
/// in `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsSnapshot {
    /// Configured script path (`None` = no script).
    pub script_path: Option<PathBuf>,
    /// User-chosen values for script-defined settings, keyed by id.
    pub custom_settings: BTreeMap<String, bool>,
}

// ── Shared settings handle ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SettingsState {
    script_path: Option<PathBuf>,
    game_version: Option<String>,
    script_settings: ScriptSettings,
    custom_values: BTreeMap<String, bool>,
}

/// Cloneable handle to the component's settings.
///
/// All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct ComponentSettings {
    inner: Arc<Mutex<SettingsState>>,
}

impl ComponentSettings {
    /// Settings with no script configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings restored from a persisted snapshot.
    pub fn from_snapshot(snapshot: SettingsSnapshot) -> Self {
        let settings = Self::new();
        settings.apply_snapshot(snapshot);
        settings
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SettingsState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The configured script path, if any.
    pub fn script_path(&self) -> Option<PathBuf> {
        self.state().script_path.clone()
    }

    /// Configure the script path. An empty path clears it.
    ///
    /// The change is picked up by the next scheduler tick.
    pub fn set_script_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let path = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self.state().script_path = path;
    }

    /// Clear the configured script path, unloading the script on the next tick.
    pub fn clear_script_path(&self) {
        self.state().script_path = None;
    }

    /// Game version most recently reported by the running script.
    pub fn game_version(&self) -> Option<String> {
        self.state().game_version.clone()
    }

    pub(crate) fn set_game_version(&self, version: Option<String>) {
        self.state().game_version = version;
    }

    /// Settings declared by the current script (empty when none is running).
    pub fn script_settings(&self) -> ScriptSettings {
        self.state().script_settings.clone()
    }

    /// Effective value of a script-defined setting.
    pub fn setting_value(&self, id: &str) -> Option<bool> {
        self.state().script_settings.value(id)
    }

    /// Record the user's choice for a script-defined setting.
    ///
    /// The choice is persisted even when the current script does not declare
    /// `id`. Returns `true` when the current script declares it.
    pub fn set_setting_value(&self, id: &str, value: bool) -> bool {
        let mut state = self.state();
        state.custom_values.insert(id.to_owned(), value);
        match state.script_settings.entries.iter_mut().find(|s| s.id == id) {
            Some(setting) => {
                setting.value = value;
                true
            }
            None => false,
        }
    }

    /// Publish the descriptor returned by a script's startup routine,
    /// re-applying persisted user values over the declared defaults.
    pub(crate) fn set_script_settings(&self, mut settings: ScriptSettings) {
        let mut state = self.state();
        for setting in &mut settings.entries {
            setting.value = state
                .custom_values
                .get(&setting.id)
                .copied()
                .unwrap_or(setting.default_value);
        }
        state.script_settings = settings;
    }

    /// Drop the current script's settings descriptor. User values are kept.
    pub(crate) fn reset_script_settings(&self) {
        self.state().script_settings = ScriptSettings::default();
    }

    /// Capture the persisted part of the settings.
    pub fn snapshot(&self) -> SettingsSnapshot {
        let state = self.state();
        SettingsSnapshot {
            script_path: state.script_path.clone(),
            custom_settings: state.custom_values.clone(),
        }
    }

    /// Replace the persisted part of the settings.
    pub fn apply_snapshot(&self, snapshot: SettingsSnapshot) {
        let mut state = self.state();
        state.script_path = snapshot
            .script_path
            .filter(|p| !p.as_os_str().is_empty());
        state.custom_values = snapshot.custom_settings;
    }
}
