//! Source control seam.
//!
//! [`GitScm`] shells out to `git` in the checkout root; tests use
//! [`crate::fakes::MemoryScm`].

use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;
use tracing::debug;

use crate::error::{RebaselineError, Result};

/// Source control operations the rebaseline commands need.
pub trait Scm: Send + Sync {
    /// Stage new files.
    fn add_list(&self, paths: &[PathBuf]) -> Result<()>;

    /// Remove files from the working tree and the index.
    fn delete_list(&self, paths: &[PathBuf]) -> Result<()>;

    /// Whether `path` is tracked.
    fn exists(&self, path: &Path) -> bool;

    fn has_working_directory_changes(&self) -> Result<bool>;

    /// Current branch name, or the commit when HEAD is detached.
    fn current_branch_or_ref(&self) -> Result<String>;

    /// Delete a local branch; a missing branch is not an error.
    fn delete_branch(&self, name: &str) -> Result<()>;

    /// Create `name` from the remote master and check it out.
    fn create_clean_branch(&self, name: &str) -> Result<()>;

    fn checkout_branch(&self, name: &str) -> Result<()>;

    fn commit_locally_with_message(&self, message: &str) -> Result<()>;

    /// Drop local changes and return to tracking the remote master.
    fn ensure_cleanly_tracking_remote_master(&self) -> Result<()>;

    /// `git blame` output for `path` with author emails.
    fn blame(&self, path: &Path) -> Result<String>;

    /// Chromium commit position recorded in the commit message, if any.
    fn commit_position_from_git_commit(&self, commit: &str) -> Option<u64>;
}

/// Extract `N` from a `Cr-Commit-Position: refs/heads/master@{#N}` footer.
pub fn parse_commit_position(message: &str) -> Option<u64> {
    let re = Regex::new(r"(?m)^Cr-Commit-Position: .*@\{#(\d+)\}").ok()?;
    re.captures_iter(message)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// [`Scm`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitScm {
    checkout_root: PathBuf,
}

impl GitScm {
    pub fn new(checkout_root: impl Into<PathBuf>) -> Self {
        GitScm {
            checkout_root: checkout_root.into(),
        }
    }

    pub fn checkout_root(&self) -> &Path {
        &self.checkout_root
    }

    fn run_git<S: AsRef<std::ffi::OsStr>>(&self, args: &[S]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.checkout_root)
            .output()
            .map_err(|e| RebaselineError::Scm(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let rendered: Vec<String> = args
                .iter()
                .map(|a| a.as_ref().to_string_lossy().into_owned())
                .collect();
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RebaselineError::Scm(format!(
                "git {} failed: {stderr}",
                rendered.join(" ")
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_git_paths(&self, subcommand: &[&str], paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<std::ffi::OsString> = subcommand.iter().map(|s| s.into()).collect();
        args.push("--".into());
        args.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
        self.run_git(&args).map(|_| ())
    }
}

impl Scm for GitScm {
    fn add_list(&self, paths: &[PathBuf]) -> Result<()> {
        debug!(count = paths.len(), "git add");
        self.run_git_paths(&["add"], paths)
    }

    fn delete_list(&self, paths: &[PathBuf]) -> Result<()> {
        debug!(count = paths.len(), "git rm");
        self.run_git_paths(&["rm", "-f"], paths)
    }

    fn exists(&self, path: &Path) -> bool {
        Command::new("git")
            .arg("ls-files")
            .arg("--error-unmatch")
            .arg("--")
            .arg(path)
            .current_dir(&self.checkout_root)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn has_working_directory_changes(&self) -> Result<bool> {
        let status = self.run_git(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(!status.trim().is_empty())
    }

    fn current_branch_or_ref(&self) -> Result<String> {
        let branch = self.run_git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = branch.trim();
        if branch != "HEAD" {
            return Ok(branch.to_string());
        }
        Ok(self.run_git(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        let exists = self
            .run_git(&["show-ref", "--quiet", "--verify", &format!("refs/heads/{name}")])
            .is_ok();
        if exists {
            self.run_git(&["branch", "-D", name])?;
        }
        Ok(())
    }

    fn create_clean_branch(&self, name: &str) -> Result<()> {
        self.run_git(&["checkout", "-q", "-b", name, "-t", "origin/master"])
            .map(|_| ())
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        self.run_git(&["checkout", "-q", name]).map(|_| ())
    }

    fn commit_locally_with_message(&self, message: &str) -> Result<()> {
        self.run_git(&["commit", "--all", "-m", message]).map(|_| ())
    }

    fn ensure_cleanly_tracking_remote_master(&self) -> Result<()> {
        self.run_git(&["reset", "--hard", "HEAD"])?;
        self.run_git(&["checkout", "-q", "origin/master"]).map(|_| ())
    }

    fn blame(&self, path: &Path) -> Result<String> {
        let args: Vec<std::ffi::OsString> = vec![
            "blame".into(),
            "--show-email".into(),
            "--".into(),
            path.as_os_str().to_os_string(),
        ];
        self.run_git(&args)
    }

    fn commit_position_from_git_commit(&self, commit: &str) -> Option<u64> {
        if commit.chars().all(|c| c == '0') {
            return None;
        }
        let message = self.run_git(&["log", "-1", "--format=%B", commit]).ok()?;
        parse_commit_position(&message)
    }
}
