//! Structured events emitted by the workers.

use tracing::{info, warn};

/// Span wrapping one task run.
pub fn task_span(action: &str) -> tracing::Span {
    tracing::info_span!("clovis.task", action = %action)
}

pub fn emit_task_dispatched(action: &str) {
    info!(event = "task.dispatched", action = %action);
}

/// Emit event: a failure was added to the failure database (warning level).
pub fn emit_failure_recorded(reason: &str, detail: &str) {
    warn!(event = "failure.recorded", reason = %reason, detail = %detail);
}

pub fn emit_trace_collected(url: &str, repeat: u32, succeeded: bool) {
    info!(
        event = "trace.collected",
        url = %url,
        repeat = repeat,
        succeeded = succeeded,
    );
}

pub fn emit_report_row(trace_path: &str) {
    info!(event = "report.row", trace_path = %trace_path);
}
