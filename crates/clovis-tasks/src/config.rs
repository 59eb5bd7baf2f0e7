//! Worker configuration.
//!
//! Every value can be overridden through `CLOVIS_*` environment variables or
//! the worker's command line.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::storage::join_path;

/// Default bucket name reported in trace locations.
pub const DEFAULT_BUCKET_NAME: &str = "clovis-traces";

/// Default command collecting one trace.
pub const DEFAULT_TRACE_COMMAND: &str = "clovis-trace";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClovisConfig {
    /// Object prefix below which all results are written.
    pub base_path: String,

    pub bucket_name: String,

    /// Local directory holding the bucket's objects.
    pub bucket_dir: PathBuf,

    /// Name of this worker; suffixes the per-worker database files.
    pub instance_name: Option<String>,

    /// Trace collection command line.
    pub trace_command: Vec<String>,

    /// Scratch directory for traces and logs before upload.
    pub work_dir: PathBuf,

    /// File receiving report rows, one JSON object per line.
    pub report_output: PathBuf,
}

impl Default for ClovisConfig {
    fn default() -> Self {
        ClovisConfig {
            base_path: std::env::var("CLOVIS_BASE_PATH").unwrap_or_else(|_| "clovis".to_string()),
            bucket_name: std::env::var("CLOVIS_BUCKET")
                .unwrap_or_else(|_| DEFAULT_BUCKET_NAME.to_string()),
            bucket_dir: std::env::var("CLOVIS_BUCKET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("bucket")),
            instance_name: std::env::var("CLOVIS_INSTANCE_NAME")
                .ok()
                .filter(|name| !name.is_empty()),
            trace_command: std::env::var("CLOVIS_TRACE_COMMAND")
                .map(|cmd| split_command(&cmd))
                .unwrap_or_else(|_| vec![DEFAULT_TRACE_COMMAND.to_string()]),
            work_dir: std::env::var("CLOVIS_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("clovis")),
            report_output: std::env::var("CLOVIS_REPORT_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("report.jsonl")),
        }
    }
}

/// Split a command line on whitespace.
pub fn split_command(cmd: &str) -> Vec<String> {
    cmd.split_whitespace().map(str::to_string).collect()
}

impl ClovisConfig {
    pub fn from_env() -> Self {
        Self::default()
    }

    fn instance_file(&self, stem: &str) -> String {
        let filename = match &self.instance_name {
            Some(name) => format!("{stem}_{name}.json"),
            None => format!("{stem}.json"),
        };
        join_path(&[&self.base_path, &filename])
    }

    /// Object name of this worker's failure database.
    pub fn failure_database_path(&self) -> String {
        self.instance_file("failures")
    }
}
