//! The `report` action: turn collected traces into report rows.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, warn};

use super::TaskHandler;
use crate::error::{ClovisError, Result};
use crate::failure_database::{FailureDatabase, CRITICAL_ERROR};
use crate::obs;
use crate::report::{ReportRow, ReportSink};
use crate::storage::Storage;
use crate::task::{ClovisTask, TaskAction};

/// Failure reason for a trace that could not be reported.
pub const REPORT_GENERATION_FAILURE: &str = "report_generation";

#[derive(Debug, Deserialize)]
struct ReportParams {
    traces: Vec<String>,
}

/// Handles `report` tasks.
pub struct ReportTaskHandler {
    storage: Arc<dyn Storage>,
    sink: Arc<dyn ReportSink>,
}

impl ReportTaskHandler {
    pub fn new(storage: Arc<dyn Storage>, sink: Arc<dyn ReportSink>) -> Self {
        ReportTaskHandler { storage, sink }
    }

    /// Object name for a trace given either as a plain path or as a
    /// `gs://<bucket>/` location in this handler's bucket.
    fn object_name<'a>(&self, trace_path: &'a str) -> &'a str {
        let prefix = format!("gs://{}/", self.storage.bucket_name());
        trace_path.strip_prefix(prefix.as_str()).unwrap_or(trace_path)
    }

    async fn report_trace(&self, trace_path: &str) -> Result<()> {
        let data = self
            .storage
            .download_as_string(self.object_name(trace_path))
            .await?
            .ok_or_else(|| ClovisError::Storage {
                path: trace_path.to_string(),
                message: "trace not found".to_string(),
            })?;
        let trace: serde_json::Value =
            serde_json::from_str(&data).map_err(|e| ClovisError::InvalidTrace {
                path: trace_path.to_string(),
                message: e.to_string(),
            })?;
        let row = ReportRow::from_trace(trace_path, &trace, Utc::now()).ok_or_else(|| {
            ClovisError::InvalidTrace {
                path: trace_path.to_string(),
                message: "no url".to_string(),
            }
        })?;
        self.sink.insert_row(&row).await?;
        obs::emit_report_row(trace_path);
        Ok(())
    }
}

#[async_trait]
impl TaskHandler for ReportTaskHandler {
    async fn run(&mut self, task: &ClovisTask, failures: &mut FailureDatabase) -> Result<()> {
        if task.known_action() != Some(TaskAction::Report) {
            error!(action = %task.action, "unsupported task action");
            failures.add_failure(CRITICAL_ERROR, "report_task_handler_run");
            return Ok(());
        }

        let params: ReportParams = task.params()?;
        for trace_path in &params.traces {
            if let Err(e) = self.report_trace(trace_path).await {
                warn!(trace = %trace_path, error = %e, "report generation failed");
                failures.add_failure(REPORT_GENERATION_FAILURE, trace_path);
            }
        }
        Ok(())
    }
}
