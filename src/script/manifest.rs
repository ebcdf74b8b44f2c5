//! Declarative script manifests.
//!
//! A manifest is a TOML document that declares what a script would: its
//! refresh rate, an optional game version and its user-facing settings. It
//! carries no splitting logic, which makes it useful for exercising the host
//! (scheduler, hot reload, settings persistence) without a script engine.
//!
//! ```toml
//! refresh_rate = 30
//! game_version = "1.0.4"
//!
//! [[settings]]
//! id = "any_percent"
//! label = "Any%"
//! default = true
//!
//! [[settings]]
//! id = "split_on_boss"
//! label = "Split on boss"
//! parent = "any_percent"
//! ```

use super::{Script, ScriptError, ScriptEvents, ScriptParser, ScriptVariables};
use crate::settings::{ScriptSetting, ScriptSettings};
use serde::Deserialize;
use tracing::{debug, trace};

fn default_refresh_rate() -> f64 {
    60.0
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default = "default_refresh_rate")]
    refresh_rate: f64,
    #[serde(default)]
    game_version: Option<String>,
    #[serde(default)]
    settings: Vec<ManifestSetting>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestSetting {
    id: String,
    label: Option<String>,
    #[serde(default = "default_true")]
    default: bool,
    parent: Option<String>,
    tooltip: Option<String>,
}

/// Parses TOML manifests into [`ManifestScript`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestParser;

impl ManifestParser {
    /// Parse `source` into a concrete manifest script.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Parse`] for malformed TOML, unknown keys, or a
    /// refresh rate that is not a positive finite number.
    pub fn parse_manifest(&self, source: &str) -> Result<ManifestScript, ScriptError> {
        let file: ManifestFile =
            toml::from_str(source).map_err(|e| ScriptError::parse(e.to_string()))?;

        if !file.refresh_rate.is_finite() || file.refresh_rate <= 0.0 {
            return Err(ScriptError::parse(format!(
                "refresh_rate must be a positive number, got {}",
                file.refresh_rate
            )));
        }

        let mut settings = ScriptSettings::new();
        for entry in file.settings {
            let label = entry.label.unwrap_or_else(|| entry.id.clone());
            let mut setting = ScriptSetting::new(entry.id, label, entry.default);
            if let Some(parent) = entry.parent {
                setting = setting.with_parent(parent);
            }
            if let Some(tooltip) = entry.tooltip {
                setting = setting.with_tooltip(tooltip);
            }
            settings.push(setting);
        }

        Ok(ManifestScript {
            refresh_rate: file.refresh_rate,
            game_version: file.game_version,
            settings,
            events: None,
            ticks: 0,
        })
    }
}

impl<S: 'static> ScriptParser<S> for ManifestParser {
    fn parse(&self, source: &str) -> Result<Box<dyn Script<S>>, ScriptError> {
        Ok(Box::new(self.parse_manifest(source)?))
    }
}

/// A script built from a manifest. Works with any host state.
#[derive(Debug)]
pub struct ManifestScript {
    refresh_rate: f64,
    game_version: Option<String>,
    settings: ScriptSettings,
    events: Option<ScriptEvents>,
    ticks: u64,
}

impl ManifestScript {
    pub fn game_version(&self) -> Option<&str> {
        self.game_version.as_deref()
    }

    pub fn settings(&self) -> &ScriptSettings {
        &self.settings
    }

    /// Updates run since startup.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl<S> Script<S> for ManifestScript {
    fn refresh_rate(&self) -> f64 {
        self.refresh_rate
    }

    fn attach(&mut self, events: ScriptEvents) {
        self.events = Some(events);
    }

    fn run_startup(&mut self, _state: &mut S) -> Result<ScriptSettings, ScriptError> {
        self.ticks = 0;
        if let (Some(version), Some(events)) = (&self.game_version, &self.events) {
            events.game_version_changed(version.clone());
        }
        debug!(
            refresh_rate = self.refresh_rate,
            settings = self.settings.len(),
            "manifest script started"
        );
        Ok(self.settings.clone())
    }

    fn run_shutdown(&mut self, _state: &mut S) -> Result<(), ScriptError> {
        debug!(ticks = self.ticks, "manifest script stopped");
        Ok(())
    }

    fn update(&mut self, _state: &mut S) -> Result<(), ScriptError> {
        self.ticks += 1;
        trace!(tick = self.ticks, "manifest script update");
        Ok(())
    }

    fn variables(&self) -> ScriptVariables {
        let mut variables = ScriptVariables::new();
        variables.insert("ticks".to_owned(), self.ticks.to_string());
        if let Some(version) = &self.game_version {
            variables.insert("game_version".to_owned(), version.clone());
        }
        variables
    }
}
