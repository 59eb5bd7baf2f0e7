//! Subprocess execution.
//!
//! The orchestrating commands re-invoke the tool itself for every
//! (test, builder) pair and run those invocations in batches through
//! [`Executive::run_in_parallel`]. Tests swap in
//! [`crate::fakes::RecordingExecutive`] and assert on the recorded calls.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{RebaselineError, Result};

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Outcome of a command run under a deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Watched {
    Completed(CommandOutput),
    /// The deadline passed; the child was killed.
    Hung,
}

/// One command line plus the directory to run it in.
pub type BatchCommand = (Vec<String>, PathBuf);

#[async_trait]
pub trait Executive: Send + Sync {
    /// Run a command to completion.
    async fn run_command(&self, args: &[String], cwd: Option<&Path>) -> Result<CommandOutput>;

    /// Run every command concurrently and wait for all of them. Outputs are
    /// returned in the order of `commands`.
    async fn run_in_parallel(&self, commands: Vec<BatchCommand>) -> Result<Vec<CommandOutput>>;

    /// Run a command, giving up after `limit`.
    async fn run_watched(&self, args: &[String], limit: Duration) -> Result<Watched>;

    /// Run a command and fail on a non-zero exit code, returning stdout.
    async fn run_and_throw_if_fail(&self, args: &[String]) -> Result<String> {
        let output = self.run_command(args, None).await?;
        if !output.success() {
            return Err(RebaselineError::Command {
                command: args.join(" "),
                message: format!("exit code {}: {}", output.exit_code, output.stderr.trim()),
            });
        }
        Ok(output.stdout)
    }
}

/// [`Executive`] spawning real processes with `tokio::process`.
///
/// `run_in_parallel` keeps at most `max_concurrent` children alive at once;
/// the default is the number of available CPUs.
#[derive(Debug, Clone, Copy)]
pub struct TokioExecutive {
    max_concurrent: usize,
}

impl Default for TokioExecutive {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map_or(1, usize::from);
        TokioExecutive { max_concurrent: cpus }
    }
}

impl TokioExecutive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    fn command(args: &[String], cwd: Option<&Path>) -> Result<Command> {
        let (exe, rest) = args.split_first().ok_or_else(|| RebaselineError::Command {
            command: String::new(),
            message: "empty command line".to_string(),
        })?;
        let mut command = Command::new(exe);
        command
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }
        Ok(command)
    }

    fn spawn_error(args: &[String], err: std::io::Error) -> RebaselineError {
        RebaselineError::Command {
            command: args.join(" "),
            message: err.to_string(),
        }
    }

    fn to_output(output: std::process::Output) -> CommandOutput {
        CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

#[async_trait]
impl Executive for TokioExecutive {
    async fn run_command(&self, args: &[String], cwd: Option<&Path>) -> Result<CommandOutput> {
        debug!(command = %args.join(" "), "running");
        let child = Self::command(args, cwd)?
            .spawn()
            .map_err(|e| Self::spawn_error(args, e))?;
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Self::spawn_error(args, e))?;
        Ok(Self::to_output(output))
    }

    async fn run_in_parallel(&self, commands: Vec<BatchCommand>) -> Result<Vec<CommandOutput>> {
        debug!(commands = commands.len(), max_concurrent = self.max_concurrent, "running batch");
        let sem = tokio::sync::Semaphore::new(self.max_concurrent);
        let runs = commands.iter().map(|(args, cwd)| {
            let sem = &sem;
            async move {
                let _permit = sem.acquire().await.ok();
                self.run_command(args, Some(cwd.as_path())).await
            }
        });
        futures::future::join_all(runs).await.into_iter().collect()
    }

    async fn run_watched(&self, args: &[String], limit: Duration) -> Result<Watched> {
        let child = Self::command(args, None)?
            .spawn()
            .map_err(|e| Self::spawn_error(args, e))?;
        match tokio::time::timeout(limit, child.wait_with_output()).await {
            Ok(output) => Ok(Watched::Completed(Self::to_output(
                output.map_err(|e| Self::spawn_error(args, e))?,
            ))),
            Err(_) => {
                // kill_on_drop reaps the child once the future is dropped.
                warn!(command = %args.join(" "), limit_secs = limit.as_secs(), "command hung");
                Ok(Watched::Hung)
            }
        }
    }
}
