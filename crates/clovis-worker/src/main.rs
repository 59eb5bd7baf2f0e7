//! Clovis worker
//!
//! Runs the task files given on the command line, in order, then uploads
//! the failure database to `<base>/failures[_<instance>].json`. Unreadable
//! task files are recorded as critical errors and skipped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use clovis_tasks::config::split_command;
use clovis_tasks::{
    ClovisConfig, ClovisTask, CommandTraceGenerator, Dispatcher, DirectoryStorage, FailureDatabase,
    JsonLinesReportSink, ReportTaskHandler, Storage, TaskAction, TraceTaskHandler,
};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "clovis-worker")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run clovis trace and report tasks", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Object prefix for all results
    #[arg(long, env = "CLOVIS_BASE_PATH")]
    base_path: Option<String>,

    /// Bucket name used in trace locations
    #[arg(long, env = "CLOVIS_BUCKET")]
    bucket: Option<String>,

    /// Local directory holding the bucket
    #[arg(long, env = "CLOVIS_BUCKET_DIR")]
    bucket_dir: Option<PathBuf>,

    /// Name of this worker instance
    #[arg(long, env = "CLOVIS_INSTANCE_NAME")]
    instance_name: Option<String>,

    /// Command collecting one trace
    #[arg(long, env = "CLOVIS_TRACE_COMMAND")]
    trace_command: Option<String>,

    /// Scratch directory for traces and logs
    #[arg(long, env = "CLOVIS_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// File receiving report rows
    #[arg(long, env = "CLOVIS_REPORT_OUTPUT")]
    report_output: Option<PathBuf>,

    /// Task files (JSON)
    #[arg(required = true)]
    tasks: Vec<PathBuf>,
}

impl Cli {
    fn config(&self) -> ClovisConfig {
        let mut config = ClovisConfig::from_env();
        if let Some(base_path) = &self.base_path {
            config.base_path = base_path.clone();
        }
        if let Some(bucket) = &self.bucket {
            config.bucket_name = bucket.clone();
        }
        if let Some(dir) = &self.bucket_dir {
            config.bucket_dir = dir.clone();
        }
        if let Some(name) = &self.instance_name {
            config.instance_name = Some(name.clone()).filter(|n| !n.is_empty());
        }
        if let Some(cmd) = &self.trace_command {
            config.trace_command = split_command(cmd);
        }
        if let Some(dir) = &self.work_dir {
            config.work_dir = dir.clone();
        }
        if let Some(path) = &self.report_output {
            config.report_output = path.clone();
        }
        config
    }
}

fn dispatcher(config: &ClovisConfig, storage: Arc<dyn Storage>) -> Dispatcher {
    let generator = Arc::new(CommandTraceGenerator::new(config.trace_command.clone()));
    let sink = Arc::new(JsonLinesReportSink::new(&config.report_output));
    Dispatcher::new()
        .with_handler(
            TaskAction::Trace,
            TraceTaskHandler::new(
                config.base_path.clone(),
                config.work_dir.clone(),
                storage.clone(),
                generator,
                config.instance_name.as_deref(),
            ),
        )
        .with_handler(TaskAction::Report, ReportTaskHandler::new(storage, sink))
}

async fn read_task(path: &Path) -> Result<ClovisTask> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read task file {}", path.display()))?;
    ClovisTask::from_json_str(&json)
        .with_context(|| format!("Failed to parse task file {}", path.display()))
}

/// Run every task file and upload the failure database.
async fn run(config: &ClovisConfig, storage: Arc<dyn Storage>, tasks: &[PathBuf]) -> Result<FailureDatabase> {
    let mut dispatcher = dispatcher(config, storage.clone());
    for path in tasks {
        match read_task(path).await {
            Ok(task) => {
                info!(task = %path.display(), action = %task.action, "running task");
                dispatcher.dispatch(&task).await;
            }
            Err(e) => {
                error!(task = %path.display(), error = %e, "skipping task");
                dispatcher.record_unreadable_task(&path.display().to_string());
            }
        }
    }

    let failures = dispatcher.into_failures();
    let location = config.failure_database_path();
    storage
        .upload_string(&failures.to_json_string()?, &location)
        .await
        .with_context(|| format!("Failed to upload failure database to {location}"))?;
    info!(location = %location, "uploaded failure database");
    Ok(failures)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = cli.config();
    let storage: Arc<dyn Storage> = Arc::new(DirectoryStorage::new(
        config.bucket_name.clone(),
        config.bucket_dir.clone(),
    ));
    let failures = run(&config, storage, &cli.tasks).await?;
    if !failures.is_empty() {
        info!(reasons = ?failures.reasons().collect::<Vec<_>>(), "finished with failures");
    }
    Ok(())
}
