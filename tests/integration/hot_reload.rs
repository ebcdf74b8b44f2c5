//! Hot reload through the debounced file watcher.

use crate::helpers::{RecordingParser, fast_config, wait_for, write_script};
use autosplit::{AutoSplitComponent, LifecycleState, ScriptChanged};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn burst_of_writes_reloads_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(dir.path(), "run.asl", "name=v1\nrate=10");
    let (parser, recorder) = RecordingParser::new();
    let component = AutoSplitComponent::new((), parser, &fast_config(5, 200)).unwrap();
    let mut changes = component.subscribe();
    component.set_script_path(&path);
    assert!(wait_for(TIMEOUT, || recorder.count("update:v1") >= 1));

    // Several saves well inside one debounce window.
    for i in 0..5 {
        std::fs::write(&path, format!("name=v2\nrate=30\n# save {i}\n")).unwrap();
        std::thread::sleep(Duration::from_millis(20));
    }

    assert!(wait_for(TIMEOUT, || recorder.count("update:v2") >= 1));
    // Give any stray second reload time to show up.
    std::thread::sleep(Duration::from_millis(500));

    assert_eq!(recorder.count("parse:v1"), 1);
    assert_eq!(recorder.count("shutdown:v1"), 1);
    assert_eq!(recorder.count("parse:v2"), 1);
    assert_eq!(recorder.count("startup:v2"), 1);
    assert_eq!(component.interval(), Duration::from_millis(33));

    let initial = changes.try_recv().unwrap();
    assert_eq!(initial.refresh_rate, Some(10.0));
    let reloaded = changes.try_recv().unwrap();
    assert_eq!(reloaded.state, LifecycleState::Running);
    assert_eq!(reloaded.refresh_rate, Some(30.0));
    assert!(changes.try_recv().is_err());

    component.dispose();
    assert_eq!(changes.try_recv().unwrap(), ScriptChanged::default());
}

#[test]
fn separate_edits_reload_separately() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(dir.path(), "run.asl", "name=v1");
    let (parser, recorder) = RecordingParser::new();
    let component = AutoSplitComponent::new((), parser, &fast_config(5, 100)).unwrap();
    component.set_script_path(&path);
    assert!(wait_for(TIMEOUT, || recorder.count("update:v1") >= 1));

    std::fs::write(&path, "name=v2").unwrap();
    assert!(wait_for(TIMEOUT, || recorder.count("update:v2") >= 1));
    std::fs::write(&path, "name=v3").unwrap();
    assert!(wait_for(TIMEOUT, || recorder.count("update:v3") >= 1));

    assert_eq!(recorder.count_kind("parse"), 3);
    assert_eq!(recorder.count_kind("shutdown"), 2);
    component.dispose();
}

#[test]
fn edits_to_sibling_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(dir.path(), "run.asl", "name=v1");
    let sibling = dir.path().join("notes.txt");
    let (parser, recorder) = RecordingParser::new();
    let component = AutoSplitComponent::new((), parser, &fast_config(5, 50)).unwrap();
    component.set_script_path(&path);
    assert!(wait_for(TIMEOUT, || recorder.count("update:v1") >= 1));

    std::fs::write(&sibling, "not a script").unwrap();
    std::thread::sleep(Duration::from_millis(300));

    assert_eq!(recorder.count_kind("parse"), 1);
    component.dispose();
}

#[test]
fn broken_edit_unloads_then_fix_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(dir.path(), "run.asl", "name=v1");
    let (parser, recorder) = RecordingParser::new();
    let component = AutoSplitComponent::new((), parser, &fast_config(5, 100)).unwrap();
    component.set_script_path(&path);
    assert!(wait_for(TIMEOUT, || recorder.count("update:v1") >= 1));

    std::fs::write(&path, "name=v2\nnonsense").unwrap();
    assert!(wait_for(TIMEOUT, || component.status().state == LifecycleState::Unloaded));
    assert_eq!(recorder.count("shutdown:v1"), 1);

    // The watcher keeps following the file after a failed load.
    std::fs::write(&path, "name=v3").unwrap();
    assert!(wait_for(TIMEOUT, || recorder.count("update:v3") >= 1));
    assert_eq!(component.status().state, LifecycleState::Running);
    component.dispose();
}

#[test]
fn disabled_watcher_ignores_edits_but_honours_requests() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(dir.path(), "run.asl", "name=v1");
    let (parser, recorder) = RecordingParser::new();
    let mut config = fast_config(5, 50);
    config.watcher.enabled = false;
    let component = AutoSplitComponent::new((), parser, &config).unwrap();
    component.set_script_path(&path);
    assert!(wait_for(TIMEOUT, || recorder.count("update:v1") >= 1));

    std::fs::write(&path, "name=v2").unwrap();
    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(recorder.count_kind("parse"), 1);

    component.request_reload();
    assert!(wait_for(TIMEOUT, || recorder.count("update:v2") >= 1));
    assert_eq!(recorder.count("shutdown:v1"), 1);
    component.dispose();
}

#[test]
fn switching_scripts_drops_pending_edit_of_old_file() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_script(dir.path(), "a.asl", "name=a");
    let b = write_script(dir.path(), "b.asl", "name=b");
    let (parser, recorder) = RecordingParser::new();
    let component = AutoSplitComponent::new((), parser, &fast_config(5, 200)).unwrap();
    component.set_script_path(&a);
    assert!(wait_for(TIMEOUT, || recorder.count("update:a") >= 1));

    // Edit the old file, then retarget while its window is still open.
    std::fs::write(&a, "name=a\n# edited").unwrap();
    std::thread::sleep(Duration::from_millis(20));
    component.set_script_path(&b);
    assert!(wait_for(TIMEOUT, || recorder.count("update:b") >= 1));

    // Well past the window the edit of a.asl opened.
    std::thread::sleep(Duration::from_millis(600));
    assert_eq!(recorder.count("parse:b"), 1);
    assert_eq!(recorder.count("shutdown:b"), 0);
    assert_eq!(recorder.count("parse:a"), 1);
    assert_eq!(component.status().state, LifecycleState::Running);
    component.dispose();
}

#[test]
fn clearing_path_drops_pending_edit() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_script(dir.path(), "run.asl", "name=v1");
    let (parser, recorder) = RecordingParser::new();
    let component = AutoSplitComponent::new((), parser, &fast_config(5, 200)).unwrap();
    component.set_script_path(&path);
    assert!(wait_for(TIMEOUT, || recorder.count("update:v1") >= 1));
    let mut changes = component.subscribe();

    std::fs::write(&path, "name=v2").unwrap();
    std::thread::sleep(Duration::from_millis(20));
    component.set_script_path("");
    assert!(wait_for(TIMEOUT, || component.status().state == LifecycleState::Unloaded));

    std::thread::sleep(Duration::from_millis(600));
    assert_eq!(changes.try_recv().unwrap(), ScriptChanged::default());
    assert!(changes.try_recv().is_err());
    assert_eq!(recorder.count("parse:v2"), 0);
    component.dispose();
}
