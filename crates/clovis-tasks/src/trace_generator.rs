//! Trace collection for a single URL.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{ClovisError, Result};

/// Default limit on one trace collection.
pub const DEFAULT_TRACE_TIMEOUT: Duration = Duration::from_secs(180);

/// What to load and how to emulate the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRequest {
    /// URL as given in the task.
    pub url: String,
    pub emulate_device: Option<String>,
    pub emulate_network: Option<String>,
}

impl TraceRequest {
    /// URL actually loaded; bare host names get an `http://` scheme.
    pub fn navigation_url(&self) -> String {
        if self.url.starts_with("http") || self.url.starts_with("file") {
            self.url.clone()
        } else {
            format!("http://{}", self.url)
        }
    }
}

/// Metadata describing one trace collection attempt.
///
/// `url` is the URL as given in the task. Metadata reported by the trace
/// itself is flattened alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMetadata {
    pub succeeded: bool,
    pub url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TraceMetadata {
    pub fn failed(url: &str) -> Self {
        TraceMetadata {
            succeeded: false,
            url: url.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[async_trait]
pub trait TraceGenerator: Send + Sync {
    /// Load `request` and write the trace to `trace_file`, logging progress
    /// to `log_file`. Failures are reported through
    /// [`TraceMetadata::succeeded`] rather than as errors.
    async fn generate(&self, request: &TraceRequest, trace_file: &Path, log_file: &Path)
        -> TraceMetadata;
}

/// [`TraceGenerator`] that shells out to a tracing command.
///
/// The command is invoked as
/// `<command...> --url <url> --output <trace_file> [--emulate-device D] [--emulate-network N]`
/// with stdout and stderr sent to the log file. A zero exit status and a
/// JSON trace file mean success; the trace's top-level `metadata` object is
/// merged into the returned metadata.
#[derive(Debug, Clone)]
pub struct CommandTraceGenerator {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandTraceGenerator {
    pub fn new(command: Vec<String>) -> Self {
        CommandTraceGenerator {
            command,
            timeout: DEFAULT_TRACE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build(&self, request: &TraceRequest, trace_file: &Path, log_file: &Path) -> Result<Command> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ClovisError::TraceGeneration("empty trace command".to_string()))?;

        let log = std::fs::File::create(log_file)?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg("--url")
            .arg(request.navigation_url())
            .arg("--output")
            .arg(trace_file);
        if let Some(device) = &request.emulate_device {
            cmd.arg("--emulate-device").arg(device);
        }
        if let Some(network) = &request.emulate_network {
            cmd.arg("--emulate-network").arg(network);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .kill_on_drop(true);
        Ok(cmd)
    }

    async fn collect(&self, request: &TraceRequest, trace_file: &Path, log_file: &Path) -> Result<TraceMetadata> {
        let mut child = self.build(request, trace_file, log_file)?.spawn()?;
        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                child.kill().await?;
                return Err(ClovisError::TraceGeneration(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };
        if !status.success() {
            return Err(ClovisError::TraceGeneration(format!("trace command exited with {status}")));
        }

        let trace: serde_json::Value = serde_json::from_str(&tokio::fs::read_to_string(trace_file).await?)?;
        let mut metadata = TraceMetadata {
            succeeded: true,
            url: request.url.clone(),
            extra: serde_json::Map::new(),
        };
        if let Some(serde_json::Value::Object(extra)) = trace.get("metadata") {
            metadata.extra = extra.clone();
            metadata.extra.remove("succeeded");
            metadata.extra.remove("url");
        }
        Ok(metadata)
    }
}

async fn append_log(log_file: &Path, message: &str) {
    let appended = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .await?;
        file.write_all(message.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    };
    if let Err(e) = appended.await {
        warn!(log = %log_file.display(), error = %e, "could not write trace log");
    }
}

#[async_trait]
impl TraceGenerator for CommandTraceGenerator {
    async fn generate(&self, request: &TraceRequest, trace_file: &Path, log_file: &Path) -> TraceMetadata {
        match tokio::fs::remove_file(trace_file).await {
            Ok(()) => debug!(path = %trace_file.display(), "removed stale trace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %trace_file.display(), error = %e, "could not remove stale trace"),
        }

        match self.collect(request, trace_file, log_file).await {
            Ok(metadata) => metadata,
            Err(e) => {
                append_log(log_file, &e.to_string()).await;
                if let Err(e) = tokio::fs::remove_file(trace_file).await {
                    debug!(error = %e, "no partial trace to remove");
                }
                TraceMetadata::failed(&request.url)
            }
        }
    }
}
