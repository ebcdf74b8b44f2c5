//! Shared helpers for integration tests.
//!
//! [`RecordingParser`] builds scripts from a tiny line-based format so each test
//! can say how its script behaves:
//!
//! ```text
//! name=v1              identity used in the call log (default "script")
//! rate=10              declared refresh rate (default 60)
//! rate_on_update=30    announce a new refresh rate on every update
//! version=1.2          announce a game version during startup
//! slow_update_ms=40    sleep inside every update
//! slow_startup_ms=40   sleep inside startup
//! fail_startup         startup returns an error
//! fail_shutdown        shutdown returns an error
//! fail_update          update returns an error
//! ```

use autosplit::script::{Script, ScriptError, ScriptEvents, ScriptParser, ScriptVariables};
use autosplit::settings::ScriptSettings;
use autosplit::AutosplitConfig;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Records every script call and how many ran at once.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Recorder {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls equal to `call` (e.g. `"startup:v1"`).
    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    /// Number of recorded calls of one kind, across script names.
    pub(crate) fn count_kind(&self, kind: &str) -> usize {
        let prefix = format!("{kind}:");
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
struct Behaviour {
    name: String,
    rate: f64,
    rate_on_update: Option<f64>,
    version: Option<String>,
    slow_update: Duration,
    slow_startup: Duration,
    fail_startup: bool,
    fail_shutdown: bool,
    fail_update: bool,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            name: "script".to_owned(),
            rate: 60.0,
            rate_on_update: None,
            version: None,
            slow_update: Duration::ZERO,
            slow_startup: Duration::ZERO,
            fail_startup: false,
            fail_shutdown: false,
            fail_update: false,
        }
    }
}

struct RecordingScript {
    recorder: Arc<Recorder>,
    behaviour: Behaviour,
    events: Option<ScriptEvents>,
    updates: u64,
}

impl RecordingScript {
    fn call(&self, kind: &str, delay: Duration) {
        self.recorder.enter();
        self.recorder.record(format!("{kind}:{}", self.behaviour.name));
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.recorder.exit();
    }
}

impl Script<()> for RecordingScript {
    fn refresh_rate(&self) -> f64 {
        self.behaviour.rate
    }

    fn attach(&mut self, events: ScriptEvents) {
        self.events = Some(events);
    }

    fn run_startup(&mut self, _state: &mut ()) -> Result<ScriptSettings, ScriptError> {
        self.call("startup", self.behaviour.slow_startup);
        if self.behaviour.fail_startup {
            return Err(ScriptError::startup("scripted startup failure"));
        }
        if let (Some(version), Some(events)) = (&self.behaviour.version, &self.events) {
            events.game_version_changed(version.clone());
        }
        Ok(ScriptSettings::new())
    }

    fn run_shutdown(&mut self, _state: &mut ()) -> Result<(), ScriptError> {
        self.call("shutdown", Duration::ZERO);
        if self.behaviour.fail_shutdown {
            return Err(ScriptError::shutdown("scripted shutdown failure"));
        }
        Ok(())
    }

    fn update(&mut self, _state: &mut ()) -> Result<(), ScriptError> {
        self.call("update", self.behaviour.slow_update);
        self.updates += 1;
        if let (Some(rate), Some(events)) = (self.behaviour.rate_on_update, &self.events) {
            events.refresh_rate_changed(rate);
        }
        if self.behaviour.fail_update {
            return Err(ScriptError::update("scripted update failure"));
        }
        Ok(())
    }

    fn variables(&self) -> ScriptVariables {
        ScriptVariables::from([
            ("name".to_owned(), self.behaviour.name.clone()),
            ("updates".to_owned(), self.updates.to_string()),
        ])
    }
}

/// Parser producing [`RecordingScript`]s that report into a shared [`Recorder`].
pub(crate) struct RecordingParser {
    recorder: Arc<Recorder>,
}

impl RecordingParser {
    pub(crate) fn new() -> (Self, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (
            Self {
                recorder: Arc::clone(&recorder),
            },
            recorder,
        )
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ScriptError> {
    value
        .parse()
        .map_err(|_| ScriptError::parse(format!("bad value for {key}: {value}")))
}

impl ScriptParser<()> for RecordingParser {
    fn parse(&self, source: &str) -> Result<Box<dyn Script<()>>, ScriptError> {
        let mut behaviour = Behaviour::default();
        for line in source.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match line.split_once('=') {
                Some(("name", v)) => behaviour.name = v.to_owned(),
                Some(("rate", v)) => behaviour.rate = parse_number("rate", v)?,
                Some(("rate_on_update", v)) => {
                    behaviour.rate_on_update = Some(parse_number("rate_on_update", v)?);
                }
                Some(("version", v)) => behaviour.version = Some(v.to_owned()),
                Some(("slow_update_ms", v)) => {
                    behaviour.slow_update = Duration::from_millis(parse_number("slow_update_ms", v)?);
                }
                Some(("slow_startup_ms", v)) => {
                    behaviour.slow_startup =
                        Duration::from_millis(parse_number("slow_startup_ms", v)?);
                }
                None if line == "fail_startup" => behaviour.fail_startup = true,
                None if line == "fail_shutdown" => behaviour.fail_shutdown = true,
                None if line == "fail_update" => behaviour.fail_update = true,
                _ => return Err(ScriptError::parse(format!("unknown directive: {line}"))),
            }
        }
        self.recorder.record(format!("parse:{}", behaviour.name));
        Ok(Box::new(RecordingScript {
            recorder: Arc::clone(&self.recorder),
            behaviour,
            events: None,
            updates: 0,
        }))
    }
}

/// Config with a short default interval and the given debounce window.
pub(crate) fn fast_config(interval_ms: u64, debounce_ms: u64) -> AutosplitConfig {
    let mut config = AutosplitConfig::default();
    config.scheduler.default_interval_ms = interval_ms;
    config.watcher.debounce_ms = debounce_ms;
    config
}

/// Write `source` to `dir/name` and return the path.
pub(crate) fn write_script(dir: &Path, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source).expect("write script");
    path
}

/// Poll `done` every 5 ms until it returns true or `timeout` elapses.
pub(crate) fn wait_for(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}
