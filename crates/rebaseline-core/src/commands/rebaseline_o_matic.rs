//! `rebaseline-o-matic`: run `auto-rebaseline` in a loop, posting its
//! output to the rebaseline log server.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::commands::AUTO_REBASELINE;
use crate::error::Result;
use crate::host::Host;
use crate::web::Web;

pub const SLEEP_TIME_IN_SECONDS: u64 = 30;

/// Destination of the log lines of each run.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Post `log`. `new_entry` starts a new entry on the server instead of
    /// appending to the current one.
    async fn post(&self, log: &str, new_entry: bool) -> Result<()>;
}

/// [`LogSink`] posting urlencoded forms to the log server.
pub struct WebLogSink {
    web: Arc<dyn Web>,
    url: String,
}

impl WebLogSink {
    pub fn new(web: Arc<dyn Web>, url: impl Into<String>) -> Self {
        WebLogSink {
            web,
            url: url.into(),
        }
    }
}

#[async_trait]
impl LogSink for WebLogSink {
    async fn post(&self, log: &str, new_entry: bool) -> Result<()> {
        let new_entry = if new_entry { "on" } else { "off" };
        self.web
            .post_form(&self.url, &[("log", log), ("newentry", new_entry)])
            .await?;
        Ok(())
    }
}

pub struct RebaselineOMatic<'a> {
    host: &'a Host,
    sink: Arc<dyn LogSink>,
    verbose: bool,
}

impl<'a> RebaselineOMatic<'a> {
    pub fn new(host: &'a Host, sink: Arc<dyn LogSink>, verbose: bool) -> Self {
        RebaselineOMatic {
            host,
            sink,
            verbose,
        }
    }

    /// Post the non-empty lines of `output` as one log entry, echoing them
    /// to `out` when verbose.
    async fn log_output<W: Write>(&self, output: &str, new_entry: bool, out: &mut W) {
        let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return;
        }
        if self.verbose {
            for line in &lines {
                if let Err(err) = writeln!(out, "{line}") {
                    warn!(error = %err, "could not echo log line");
                }
            }
        }
        if let Err(err) = self.sink.post(&lines.join("\n"), new_entry).await {
            warn!(error = %err, "could not post log to server");
        }
    }

    async fn run_logged_command<W: Write>(&self, args: &[String], out: &mut W) -> Result<()> {
        let output = self.host.executive.run_command(args, None).await?;
        let combined = format!("{}{}", output.stdout, output.stderr);
        self.log_output(&combined, true, out).await;
        if !output.success() {
            warn!(command = %args.join(" "), exit_code = output.exit_code, "command failed");
        }
        Ok(())
    }

    async fn pull_and_rebaseline<W: Write>(&self, out: &mut W) -> Result<()> {
        let pull = self
            .host
            .executive
            .run_and_throw_if_fail(&["git".to_string(), "pull".to_string()])
            .await?;
        debug!(output = %pull.trim(), "pulled");

        let mut command = self.host.tool_args(AUTO_REBASELINE);
        if self.verbose {
            command.push("--verbose".to_string());
        }
        self.run_logged_command(&command, out).await
    }

    /// One pull + `auto-rebaseline` cycle. Failures are logged and the
    /// original branch is checked out again.
    pub async fn do_one_rebaseline<W: Write>(&self, out: &mut W) -> Result<()> {
        let old_branch = self.host.scm.current_branch_or_ref()?;
        if let Err(err) = self.pull_and_rebaseline(out).await {
            error!(error = %err, "rebaseline cycle failed");
            // git sometimes leaves the checkout on a detached head.
            if let Err(err) = self.host.scm.checkout_branch(&old_branch) {
                error!(error = %err, branch = %old_branch, "could not restore branch");
            }
        }
        Ok(())
    }

    /// Loop forever, or `max_iterations` times.
    pub async fn run<W: Write>(&self, max_iterations: Option<usize>, out: &mut W) -> Result<()> {
        let mut iteration = 0;
        loop {
            iteration += 1;
            info!(iteration, "starting rebaseline cycle");
            self.do_one_rebaseline(out).await?;
            if max_iterations.is_some_and(|max| iteration >= max) {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_secs(SLEEP_TIME_IN_SECONDS)).await;
        }
    }
}
