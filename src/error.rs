//! Error types for the auto-splitter host.

/// Top-level error type for the component and its supporting services.
#[derive(Debug, thiserror::Error)]
pub enum AutosplitError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watcher subscription error.
    #[error("watcher error: {0}")]
    Watcher(String),

    /// Periodic scheduler error (timer thread, runtime).
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// Serialized worker error (spawn, shutdown).
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<notify::Error> for AutosplitError {
    fn from(err: notify::Error) -> Self {
        Self::Watcher(err.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AutosplitError>;
