//! The `trace` action: collect traces for a list of URLs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::TaskHandler;
use crate::error::Result;
use crate::failure_database::{FailureDatabase, CRITICAL_ERROR, DIRTY_STATE_ERROR};
use crate::obs;
use crate::storage::{cloud_location, join_path, Storage};
use crate::task::{ClovisTask, TaskAction};
use crate::trace_database::TraceDatabase;
use crate::trace_generator::{TraceGenerator, TraceMetadata, TraceRequest};

/// Failure reason for a URL whose trace could not be collected.
pub const TRACE_COLLECTION_FAILURE: &str = "trace_collection";

const LOG_FILENAME: &str = "analyze.log";

#[derive(Debug, Deserialize)]
struct TraceParams {
    urls: Vec<String>,
    #[serde(default = "default_repeat_count")]
    repeat_count: u32,
    #[serde(default)]
    emulate_device: Option<String>,
    #[serde(default)]
    emulate_network: Option<String>,
}

fn default_repeat_count() -> u32 {
    1
}

/// Replace characters that are unsafe in storage object names with `_`.
pub fn storage_safe_name(url: &str) -> String {
    static UNSAFE_CHARS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[#?\[\]*/]").expect("storage name pattern must compile"));
    UNSAFE_CHARS.replace_all(url, "_").into_owned()
}

/// Handles `trace` tasks.
///
/// Successful traces are uploaded below `<base>/traces/` and indexed in the
/// trace database; failed ones go below `<base>/failures/`. Each trace is
/// uploaded with its log next to it (`.log` suffix).
pub struct TraceTaskHandler {
    base_path: String,
    work_dir: PathBuf,
    storage: Arc<dyn Storage>,
    generator: Arc<dyn TraceGenerator>,
    trace_database_path: String,
    trace_database: TraceDatabase,
    initialized: bool,
}

impl TraceTaskHandler {
    pub fn new(
        base_path: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        storage: Arc<dyn Storage>,
        generator: Arc<dyn TraceGenerator>,
        instance_name: Option<&str>,
    ) -> Self {
        let base_path = base_path.into();
        let filename = match instance_name {
            Some(name) => format!("trace_database_{name}.json"),
            None => "trace_database.json".to_string(),
        };
        TraceTaskHandler {
            trace_database_path: join_path(&[&base_path, &filename]),
            base_path,
            work_dir: work_dir.into(),
            storage,
            generator,
            trace_database: TraceDatabase::new(),
            initialized: false,
        }
    }

    pub fn trace_database_path(&self) -> &str {
        &self.trace_database_path
    }

    pub fn trace_database(&self) -> &TraceDatabase {
        &self.trace_database
    }

    /// Recover the trace database of a previous run. Runs once.
    async fn initialize(&mut self, failures: &mut FailureDatabase) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;
        tokio::fs::create_dir_all(&self.work_dir).await?;

        info!(path = %self.trace_database_path, "downloading trace database");
        let existing = self
            .storage
            .download_as_string(&self.trace_database_path)
            .await?
            .unwrap_or_else(|| "{}".to_string());
        self.trace_database = TraceDatabase::from_json_str(&existing)?;
        if !self.trace_database.is_empty() {
            // Left over from a worker that died mid-run.
            failures.add_failure(DIRTY_STATE_ERROR, "trace_database");
        }
        Ok(())
    }

    async fn upload_trace_database(&self) -> Result<()> {
        info!(path = %self.trace_database_path, traces = self.trace_database.len(), "uploading trace database");
        self.storage
            .upload_string(&self.trace_database.to_json_string()?, &self.trace_database_path)
            .await
    }

    async fn handle_results(
        &mut self,
        trace_file: &Path,
        log_file: &Path,
        remote_name: &str,
        metadata: &TraceMetadata,
        failures: &mut FailureDatabase,
    ) -> Result<()> {
        let remote_location = if metadata.succeeded {
            let location = join_path(&[&self.base_path, "traces", remote_name]);
            let full = cloud_location(self.storage.bucket_name(), &location);
            self.trace_database.set_trace(&full, metadata.to_value());
            location
        } else {
            warn!(url = %metadata.url, "trace generation failed");
            failures.add_failure(TRACE_COLLECTION_FAILURE, &metadata.url);
            join_path(&[&self.base_path, "failures", remote_name])
        };

        if is_file(trace_file).await {
            debug!(location = %remote_location, "uploading trace");
            self.storage.upload_file(trace_file, &remote_location).await?;
        } else {
            warn!(path = %trace_file.display(), "no trace found");
        }

        let log_location = format!("{remote_location}.log");
        if is_file(log_file).await {
            self.storage.upload_file(log_file, &log_location).await?;
        } else {
            warn!(path = %log_file.display(), "no trace log found");
        }
        Ok(())
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[async_trait]
impl TaskHandler for TraceTaskHandler {
    async fn run(&mut self, task: &ClovisTask, failures: &mut FailureDatabase) -> Result<()> {
        if task.known_action() != Some(TaskAction::Trace) {
            error!(action = %task.action, "unsupported task action");
            failures.add_failure(CRITICAL_ERROR, "trace_task_handler_run");
            return Ok(());
        }

        self.initialize(failures).await?;
        let params: TraceParams = task.params()?;
        let log_file = self.work_dir.join(LOG_FILENAME);
        let mut urls = params.urls;
        let mut success_happened = false;

        while let Some(url) = urls.pop() {
            let name = storage_safe_name(&url);
            let trace_file = self.work_dir.join(&name);
            let request = TraceRequest {
                url,
                emulate_device: params.emulate_device.clone(),
                emulate_network: params.emulate_network.clone(),
            };
            for repeat in 0..params.repeat_count {
                debug!(url = %request.url, repeat = repeat, "generating trace");
                let metadata = self.generator.generate(&request, &trace_file, &log_file).await;
                obs::emit_trace_collected(&request.url, repeat, metadata.succeeded);
                success_happened |= metadata.succeeded;
                let remote_name = join_path(&[&name, &repeat.to_string()]);
                self.handle_results(&trace_file, &log_file, &remote_name, &metadata, failures)
                    .await?;
            }
        }

        if success_happened {
            self.upload_trace_database().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_safe_name() {
        assert_eq!(
            storage_safe_name("http://a.com/b?c=[1]#top*"),
            "http:__a.com_b_c=_1__top_"
        );
        assert_eq!(storage_safe_name("a.com"), "a.com");
    }

    #[test]
    fn test_params_defaults() {
        let params: TraceParams = serde_json::from_value(serde_json::json!({"urls": ["a"]})).unwrap();
        assert_eq!(params.repeat_count, 1);
        assert!(params.emulate_device.is_none());
        assert!(params.emulate_network.is_none());
    }
}
