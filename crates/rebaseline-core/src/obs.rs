//! Structured observability hooks for rebaseline runs.
//!
//! Events are emitted at `info!` level unless noted (filter with `RUST_LOG`).
//! For JSON output, pass `--json` to the binaries.

use tracing::info;

/// Span wrapping one subcommand run; attach it with `Instrument`.
pub fn command_span(command: &str) -> tracing::Span {
    tracing::info_span!("rebaseline.command", command = %command)
}

/// Emit event: a baseline file was written.
pub fn emit_baseline_written(path: &str, bytes: usize) {
    info!(event = "baseline.written", path = %path, bytes = bytes);
}

/// Emit event: a test was not rebaselined (warning level).
pub fn emit_rebaseline_skipped(test: &str, reason: &str) {
    tracing::warn!(event = "rebaseline.skipped", test = %test, reason = %reason);
}

/// Emit event: an expectations file was rewritten.
pub fn emit_expectations_updated(path: &str, modified: usize, removed: usize) {
    info!(
        event = "expectations.updated",
        path = %path,
        modified = modified,
        removed = removed,
    );
}

/// Emit event: a batch of subprocesses is about to run.
pub fn emit_batch_started(phase: &str, commands: usize) {
    info!(event = "batch.started", phase = %phase, commands = commands);
}

/// Emit event: one step of the commit-and-land flow finished.
pub fn emit_land_step(step: &str, completed: bool) {
    info!(event = "land.step", step = %step, completed = completed);
}
