//! Configuration types for the auto-splitter host.

use crate::settings::SettingsSnapshot;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosplitConfig {
    /// Periodic scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Script file watcher settings.
    pub watcher: WatcherConfig,
    /// Persisted component settings (script path, user setting values).
    pub component: SettingsSnapshot,
}

/// Periodic scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Interval used until a loaded script declares its own refresh rate.
    ///
    /// 66 ms is roughly 15 ticks per second. Values below 1 are treated as 1.
    pub default_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 66,
        }
    }
}

impl SchedulerConfig {
    /// The starting timer interval, floored at one millisecond.
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms.max(1))
    }
}

/// Script file watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Whether edits to the script file trigger a hot reload.
    pub enabled: bool,
    /// Quiescence window after the last change notification before a reload
    /// is requested.
    pub debounce_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 200,
        }
    }
}

impl WatcherConfig {
    /// The debounce window as a [`Duration`].
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl AutosplitConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AutosplitError::Config(e.to_string()))
    }

    /// Load the config at `path`, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_or_default(path: &std::path::Path) -> crate::error::Result<Self> {
        match Self::from_file(path) {
            Ok(config) => Ok(config),
            Err(crate::error::AutosplitError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AutosplitError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/autosplit/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = dirs::config_dir() {
            config.join("autosplit").join("config.toml")
        } else {
            PathBuf::from("/tmp/autosplit-config/config.toml")
        }
    }
}
