//! Config persistence: TOML round trips and user setting values carried
//! across component restarts.

use crate::helpers::wait_for;
use autosplit::script::ManifestParser;
use autosplit::{AutoSplitComponent, AutosplitConfig, ComponentFactory, LifecycleState};
use std::path::PathBuf;
use std::time::Duration;

const MANIFEST: &str = r#"
refresh_rate = 20

[[settings]]
id = "any_percent"
label = "Any%"

[[settings]]
id = "split_on_boss"
label = "Split on boss"
parent = "any_percent"
"#;

#[test]
fn config_file_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = AutosplitConfig::default();
    config.scheduler.default_interval_ms = 15;
    config.watcher.enabled = false;
    config.component.script_path = Some(PathBuf::from("/splits/run.toml"));
    config.component.custom_settings.insert("any_percent".to_owned(), false);
    config.save_to_file(&path).unwrap();

    let loaded = AutosplitConfig::from_file(&path).unwrap();
    assert_eq!(loaded.scheduler.default_interval_ms, 15);
    assert!(!loaded.watcher.enabled);
    assert_eq!(loaded.watcher.debounce_ms, 200);
    assert_eq!(loaded.component, config.component);
}

#[test]
fn partial_config_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[watcher]\ndebounce_ms = 500\n").unwrap();

    let config = AutosplitConfig::load_or_default(&path).unwrap();
    assert_eq!(config.watcher.debounce(), Duration::from_millis(500));
    assert!(config.watcher.enabled);
    assert_eq!(config.scheduler.default_interval(), Duration::from_millis(66));
    assert!(config.component.script_path.is_none());
}

#[test]
fn user_setting_values_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("run.toml");
    std::fs::write(&script, MANIFEST).unwrap();
    let config_path = dir.path().join("config.toml");

    let mut config = AutosplitConfig::default();
    config.scheduler.default_interval_ms = 5;
    let component = ComponentFactory
        .create_with_script((), ManifestParser, &config, &script)
        .unwrap();
    assert!(wait_for(Duration::from_secs(3), || {
        component.status().state == LifecycleState::Running
    }));
    assert_eq!(component.settings().setting_value("split_on_boss"), Some(true));
    assert!(component.settings().set_setting_value("split_on_boss", false));

    config.component = component.settings().snapshot();
    component.dispose();
    config.save_to_file(&config_path).unwrap();

    let restored = AutosplitConfig::from_file(&config_path).unwrap();
    let component = AutoSplitComponent::new((), ManifestParser, &restored).unwrap();
    assert!(wait_for(Duration::from_secs(3), || {
        component.status().state == LifecycleState::Running
    }));
    assert_eq!(component.settings().script_path(), Some(script));
    assert_eq!(component.settings().setting_value("split_on_boss"), Some(false));
    assert_eq!(component.settings().setting_value("any_percent"), Some(true));
    assert_eq!(component.interval(), Duration::from_millis(50));
    component.dispose();
}
