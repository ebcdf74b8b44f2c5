//! Error types for calls into script code.

use std::fmt;
use std::path::PathBuf;

/// The script entry point a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPhase {
    /// Turning source text into a script object.
    Parse,
    /// The script's startup routine.
    Startup,
    /// The script's shutdown routine.
    Shutdown,
    /// The script's per-tick update routine.
    Update,
    /// Reading the script's variables for display.
    Inspect,
}

impl fmt::Display for ScriptPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Parse => "parse",
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Update => "update",
            Self::Inspect => "inspect",
        };
        f.write_str(label)
    }
}

/// Errors raised by the parser or by a loaded script.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The script file could not be read.
    #[error("cannot read script {}: {source}", .path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The source text is not a valid script.
    #[error("parse error: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    /// The startup routine failed.
    #[error("startup failed: {message}")]
    Startup {
        /// Failure description.
        message: String,
    },

    /// The shutdown routine failed.
    #[error("shutdown failed: {message}")]
    Shutdown {
        /// Failure description.
        message: String,
    },

    /// The per-tick update routine failed.
    #[error("update failed: {message}")]
    Update {
        /// Failure description.
        message: String,
    },

    /// Script code panicked.
    #[error("script panicked during {phase}: {message}")]
    Panicked {
        /// Entry point that panicked.
        phase: ScriptPhase,
        /// Panic payload, when it was a string.
        message: String,
    },
}

impl ScriptError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn startup(message: impl Into<String>) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }

    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
        }
    }

    pub fn update(message: impl Into<String>) -> Self {
        Self::Update {
            message: message.into(),
        }
    }
}
