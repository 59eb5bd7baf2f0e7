//! Error types for clovis task handling.

use thiserror::Error;

/// Errors raised while running a clovis task.
///
/// Handlers never let these escape the dispatcher: they are logged and
/// turned into failure database records.
#[derive(Error, Debug)]
pub enum ClovisError {
    #[error("unsupported task action: {0}")]
    UnsupportedAction(String),

    #[error("invalid parameters for {action}: {message}")]
    InvalidParams { action: String, message: String },

    #[error("storage error at {path}: {message}")]
    Storage { path: String, message: String },

    #[error("invalid trace {path}: {message}")]
    InvalidTrace { path: String, message: String },

    #[error("trace generation failed: {0}")]
    TraceGeneration(String),

    #[error("report sink error: {0}")]
    ReportSink(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for clovis operations.
pub type Result<T> = std::result::Result<T, ClovisError>;
