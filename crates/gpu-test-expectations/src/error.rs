//! Error types for GPU test expectations.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GpuExpectationError {
    #[error("unknown condition: {0}")]
    UnknownCondition(String),

    #[error("invalid device condition {condition}: {reason}")]
    InvalidDevice { condition: String, reason: String },

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("conformance test does not exist: {}", .0.display())]
    MissingTest(PathBuf),

    #[error("invalid GPU configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GpuExpectationError>;
