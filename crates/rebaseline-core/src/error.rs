//! Error taxonomy for the rebaseline tooling.

use std::path::PathBuf;

/// Errors produced while reading expectations, talking to builders, or
/// driving source control.
#[derive(Debug, thiserror::Error)]
pub enum RebaselineError {
    #[error("unknown builder: {0}")]
    UnknownBuilder(String),

    #[error("unknown port: {0}")]
    UnknownPort(String),

    #[error("no port has primary baseline directory {0}")]
    NoPortForBaseline(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid layout test results: {0}")]
    InvalidResults(String),

    #[error("source control error: {0}")]
    Scm(String),

    #[error("command {command} failed: {message}")]
    Command { command: String, message: String },

    #[error("http error: {0}")]
    Http(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RebaselineError {
    fn from(err: reqwest::Error) -> Self {
        RebaselineError::Http(err.to_string())
    }
}

/// Result type for rebaseline operations.
pub type Result<T> = std::result::Result<T, RebaselineError>;
