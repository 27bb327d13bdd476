//! Script Manager Error Types
//!
//! Defines the error hierarchy for discovery, capture, watching and
//! configuration. Failures raised *by script code* never surface here:
//! the runner turns them into an unsuccessful `ExecutionResult`.

use std::path::PathBuf;
use thiserror::Error;

/// Script manager errors
#[derive(Debug, Error)]
pub enum ScriptError {
    /// I/O error while reading scripts or creating the scripts folder
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Script source does not compile
    #[error("Syntax error in {}: {message}", path.display())]
    Syntax { path: PathBuf, message: String },

    /// Interpreter error outside of script execution (namespace setup, bridges)
    #[error("Lua error: {0}")]
    Lua(String),

    /// Script file does not exist
    #[error("Script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    /// A capture session is already active on this capturer
    #[error("Output capture already active")]
    CaptureActive,

    /// File system watcher could not be created or registered
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Configuration file is malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for script manager operations
pub type ScriptResult<T> = Result<T, ScriptError>;

impl ScriptError {
    /// Create a syntax error for a script path
    pub fn syntax(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ScriptError::Syntax {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<mlua::Error> for ScriptError {
    fn from(err: mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => ScriptError::Syntax {
                path: PathBuf::new(),
                message,
            },
            other => ScriptError::Lua(other.to_string()),
        }
    }
}

impl From<notify::Error> for ScriptError {
    fn from(err: notify::Error) -> Self {
        ScriptError::Watcher(err.to_string())
    }
}
