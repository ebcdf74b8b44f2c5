//! Component identity and construction entry points.

use crate::component::AutoSplitComponent;
use crate::config::AutosplitConfig;
use crate::error::Result;
use crate::script::ScriptParser;
use std::fmt;
use std::path::Path;

/// Where the host lists the component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentCategory {
    /// Drives the timer rather than displaying information.
    Control,
    Information,
    List,
    Media,
    Other,
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Control => "Control",
            Self::Information => "Information",
            Self::List => "List",
            Self::Media => "Media",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

/// Creates [`AutoSplitComponent`]s and describes them to the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentFactory;

impl ComponentFactory {
    /// Display name of the component.
    pub const NAME: &'static str = "Scriptable Auto Splitter (High Precision)";

    /// One-line description shown in the host's component list.
    pub const DESCRIPTION: &'static str =
        "Allows scripts written in the ASL language to define the splitting behavior.";

    /// Name the host's updater matches releases against.
    pub const UPDATE_NAME: &'static str = Self::NAME;

    pub const CATEGORY: ComponentCategory = ComponentCategory::Control;

    /// Component version, taken from the package manifest.
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Create a component using the script path persisted in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the component's threads cannot be started.
    pub fn create<S, P>(&self, state: S, parser: P, config: &AutosplitConfig) -> Result<AutoSplitComponent>
    where
        S: Send + 'static,
        P: ScriptParser<S>,
    {
        AutoSplitComponent::new(state, parser, config)
    }

    /// Create a component for `script_path`, overriding the persisted path.
    ///
    /// # Errors
    ///
    /// Returns an error if the component's threads cannot be started.
    pub fn create_with_script<S, P>(
        &self,
        state: S,
        parser: P,
        config: &AutosplitConfig,
        script_path: &Path,
    ) -> Result<AutoSplitComponent>
    where
        S: Send + 'static,
        P: ScriptParser<S>,
    {
        let mut config = config.clone();
        config.component.script_path = Some(script_path.to_path_buf());
        AutoSplitComponent::new(state, parser, &config)
    }
}
