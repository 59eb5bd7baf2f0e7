//! `auto-rebaseline`: rebaseline the `NeedsRebaseline` lines every bot has
//! cycled through, then commit and land the result.
//!
//! The lines come from `git blame` of the generic expectations file. Only
//! lines committed at or before the oldest revision the release bots have
//! built are eligible, and only those of a single commit are processed per
//! run so the commit message can credit one author.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::change_set::ChangeSet;
use crate::commands::all_suffixes;
use crate::commands::parallel::{ParallelRebaseliner, RebaselineOptions, TestPrefixList};
use crate::error::{RebaselineError, Result};
use crate::executive::Watched;
use crate::host::Host;
use crate::obs;

pub const MAX_LINES_TO_REBASELINE: usize = 200;
pub const SECONDS_BEFORE_GIVING_UP: u64 = 300;
pub const AUTO_REBASELINE_BRANCH_NAME: &str = "auto-rebaseline-temporary-branch";
pub const AUTO_REBASELINE_ALT_BRANCH_NAME: &str = "auto-rebaseline-alt-temporary-branch";

const NEEDS_REBASELINE: &str = "NeedsRebaseline";

struct BlamePatterns {
    /// Commit hash, `<author>`, and the test name before the final ` [`.
    line: Regex,
    bug: Regex,
    whitespace: Regex,
}

static BLAME_PATTERNS: LazyLock<BlamePatterns> = LazyLock::new(|| BlamePatterns {
    line: Regex::new(r"^(\S*)[^(]*\((\S*).*?([^ ]*) \[[^\[]*$").expect("blame line pattern must compile"),
    bug: Regex::new(r"crbug\.com/(\d+)").expect("bug pattern must compile"),
    whitespace: Regex::new(r"\s+").expect("whitespace pattern must compile"),
});

/// State of the tree as reported by the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeStatus {
    Open,
    Closed,
    Unknown,
}

pub fn parse_tree_status(body: &str) -> TreeStatus {
    let status = body.trim().to_lowercase();
    if status.contains("closed") || status == "0" {
        TreeStatus::Closed
    } else if status.contains("open") || status == "1" {
        TreeStatus::Open
    } else {
        TreeStatus::Unknown
    }
}

/// Latest revision built by one release builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotRevision {
    pub builder: String,
    pub revision: u64,
}

/// Lines picked from the blame output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestsToRebaseline {
    pub tests: BTreeSet<String>,
    pub revision: Option<u64>,
    pub commit: Option<String>,
    pub author: Option<String>,
    pub bugs: BTreeSet<String>,
    /// Whether any line mentioned `NeedsRebaseline` at all.
    pub has_any_needs_rebaseline_lines: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoRebaselineOptions {
    pub rebaseline: RebaselineOptions,

    /// Rebaseline and update expectations without touching branches,
    /// committing or uploading.
    pub dry_run: bool,

    /// Passed to `git cl` as `--auth-refresh-token-json`.
    pub auth_refresh_token_json: Option<PathBuf>,
}

fn strip_comments(patterns: &BlamePatterns, line: &str) -> String {
    let without_comment = match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    };
    patterns
        .whitespace
        .replace_all(without_comment.trim(), " ")
        .into_owned()
}

/// `<foo@chromium.org@bbb929c8-...>` → `foo@chromium.org`.
fn clean_author(raw: &str) -> String {
    let email = raw.trim_start_matches('<').trim_end_matches('>');
    match email.match_indices('@').nth(1) {
        Some((index, _)) => email[..index].to_string(),
        None => email.to_string(),
    }
}

/// Pick the tests to rebaseline from `blame` output.
pub fn tests_to_rebaseline(
    host: &Host,
    blame: &str,
    min_revision: u64,
    print_revisions: bool,
) -> TestsToRebaseline {
    let patterns = &*BLAME_PATTERNS;
    let mut picked = TestsToRebaseline::default();
    for raw in blame.lines() {
        let line = strip_comments(patterns, raw);
        if !line.contains(NEEDS_REBASELINE) {
            continue;
        }
        picked.has_any_needs_rebaseline_lines = true;

        let Some(caps) = patterns.line.captures(&line) else {
            info!("Couldn't find blame info for expectations line, skipping [line={line}].");
            continue;
        };
        let commit = caps.get(1).map_or("", |m| m.as_str());
        let test = caps.get(3).map_or("", |m| m.as_str());
        let position = host.scm.commit_position_from_git_commit(commit);
        if print_revisions {
            info!(test = %test, revision = ?position, "waiting for revision");
        }

        let Some(position) = position else {
            continue;
        };
        if position > min_revision {
            continue;
        }
        match picked.revision {
            Some(revision) if revision != position => continue,
            Some(_) => {}
            None => {
                picked.revision = Some(position);
                picked.commit = Some(commit.to_string());
                picked.author = caps.get(2).map(|m| clean_author(m.as_str()));
            }
        }

        picked.bugs.extend(
            patterns
                .bug
                .captures_iter(&line)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_string()),
        );
        picked.tests.insert(test.to_string());
        if picked.tests.len() >= MAX_LINES_TO_REBASELINE {
            info!(
                "Too many tests to rebaseline in one patch. Doing the first {}.",
                MAX_LINES_TO_REBASELINE
            );
            break;
        }
    }
    picked
}

pub fn commit_message(
    repo_url: &str,
    author: &str,
    revision: u64,
    commit: &str,
    bugs: &BTreeSet<String>,
) -> String {
    let mut message = format!("Auto-rebaseline for r{revision}\n\n{repo_url}/+/{commit}\n\n");
    if !bugs.is_empty() {
        let bugs: Vec<&str> = bugs.iter().map(String::as_str).collect();
        message.push_str(&format!("BUG={}\n", bugs.join(",")));
    }
    message.push_str(&format!("TBR={author}\n"));
    message
}

pub struct AutoRebaseline<'a> {
    host: &'a Host,
    options: AutoRebaselineOptions,
    time_limit: Duration,
}

impl<'a> AutoRebaseline<'a> {
    pub fn new(host: &'a Host, options: AutoRebaselineOptions) -> Self {
        AutoRebaseline {
            host,
            options,
            time_limit: Duration::from_secs(SECONDS_BEFORE_GIVING_UP),
        }
    }

    /// How long a `git cl` command may run before it is considered hung.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub async fn tree_status(&self) -> Result<TreeStatus> {
        let body = self.host.web.get_binary(&self.host.config.tree_status_url).await?;
        Ok(body.map_or(TreeStatus::Unknown, |bytes| {
            parse_tree_status(&String::from_utf8_lossy(&bytes))
        }))
    }

    /// Latest revision of every release builder. Empty when a run was
    /// interrupted or a builder has no usable results.
    pub async fn bot_revision_data(&self) -> Result<Vec<BotRevision>> {
        let mut revisions = Vec::new();
        for builder in self.host.builders.release_builders() {
            let Some(results) = self.host.results.latest_results(&builder).await? else {
                error!(builder = %builder, "no results for builder");
                return Ok(Vec::new());
            };
            if results.run_was_interrupted() {
                error!(
                    "Can't rebaseline because the latest run on {} exited early.",
                    results.builder_name().unwrap_or(&builder)
                );
                return Ok(Vec::new());
            }
            let Some(revision) = results.chromium_revision() else {
                error!(builder = %builder, "results carry no revision");
                return Ok(Vec::new());
            };
            revisions.push(BotRevision { builder, revision });
        }
        Ok(revisions)
    }

    /// `NeedsRebaseline` tests among `tests`, per release builder whose
    /// port's expectations carry the marker.
    pub fn test_prefix_list(&self, tests: &BTreeSet<String>) -> Result<TestPrefixList> {
        let mut list = TestPrefixList::new();
        for builder in self.host.builders.release_builders() {
            let port = self.host.port_for_builder(&builder)?;
            for test in port.tests_with_expectation(NEEDS_REBASELINE)? {
                if tests.contains(&test) {
                    list.entry(test)
                        .or_default()
                        .insert(builder.clone(), all_suffixes());
                }
            }
        }
        Ok(list)
    }

    fn git_cl_args(&self, command: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = ["git", "cl"]
            .iter()
            .chain(command)
            .map(|s| s.to_string())
            .collect();
        if self.options.rebaseline.verbose {
            args.push("--verbose".to_string());
        }
        if let Some(path) = &self.options.auth_refresh_token_json {
            args.push("--auth-refresh-token-json".to_string());
            args.push(path.display().to_string());
        }
        args
    }

    /// Run a `git cl` command; `false` when it hung.
    async fn run_git_cl_command(&self, command: &[&str]) -> Result<bool> {
        let args = self.git_cl_args(command);
        match self.host.executive.run_watched(&args, self.time_limit).await? {
            Watched::Completed(output) => {
                for line in output.stdout.lines().chain(output.stderr.lines()) {
                    if !line.is_empty() {
                        info!("{line}");
                    }
                }
                Ok(true)
            }
            Watched::Hung => {
                error!("Command hung: {}", args.join(" "));
                Ok(false)
            }
        }
    }

    pub async fn execute(&self) -> Result<()> {
        let scm = &self.host.scm;
        if !self.options.dry_run && scm.has_working_directory_changes()? {
            error!("Cannot proceed with working directory changes. Clean working directory first.");
            return Ok(());
        }

        let revision_data = self.bot_revision_data().await?;
        let Some(min_revision) = revision_data.iter().map(|r| r.revision).min() else {
            return Ok(());
        };

        let blame = scm.blame(&self.host.path_to_generic_test_expectations_file())?;
        let picked = tests_to_rebaseline(self.host, &blame, min_revision, self.options.rebaseline.verbose);
        if self.options.rebaseline.verbose {
            info!("Min revision across all bots is {min_revision}.");
            for item in &revision_data {
                info!("{}: r{}", item.builder, item.revision);
            }
        }
        if picked.tests.is_empty() {
            debug!(
                any_marked = picked.has_any_needs_rebaseline_lines,
                "no tests to rebaseline"
            );
            return Ok(());
        }
        info!(
            "Rebaselining {} tests for r{}.",
            picked.tests.len(),
            picked.revision.unwrap_or_default()
        );

        let test_prefix_list = self.test_prefix_list(&picked.tests)?;
        if self.tree_status().await? == TreeStatus::Closed {
            info!("Cannot proceed. Tree is closed.");
            return Ok(());
        }

        let old_branch = scm.current_branch_or_ref()?;
        let branch = if old_branch == AUTO_REBASELINE_BRANCH_NAME {
            AUTO_REBASELINE_ALT_BRANCH_NAME
        } else {
            AUTO_REBASELINE_BRANCH_NAME
        };

        let mut switched_branches = false;
        let mut did_finish = false;
        let outcome = self
            .rebaseline_and_land(&picked, &test_prefix_list, branch, &mut switched_branches, &mut did_finish)
            .await;
        if let Err(err) = &outcome {
            error!(error = %err, "auto-rebaseline failed");
        }

        if switched_branches {
            self.clean_up(branch, &old_branch, did_finish).await?;
        }
        Ok(())
    }

    async fn rebaseline_and_land(
        &self,
        picked: &TestsToRebaseline,
        test_prefix_list: &TestPrefixList,
        branch: &str,
        switched_branches: &mut bool,
        did_finish: &mut bool,
    ) -> Result<ChangeSet> {
        let scm = &self.host.scm;
        if !self.options.dry_run {
            scm.delete_branch(branch)?;
            scm.create_clean_branch(branch)?;
            *switched_branches = true;
        }

        let mut changes = ChangeSet::new();
        if !test_prefix_list.is_empty() {
            changes = ParallelRebaseliner::new(self.host, self.options.rebaseline.clone())
                .rebaseline(test_prefix_list)
                .await?;
        }
        if self.options.dry_run {
            return Ok(changes);
        }

        let (Some(author), Some(revision), Some(commit)) =
            (&picked.author, picked.revision, &picked.commit)
        else {
            return Err(RebaselineError::Scm("blame line without commit info".to_string()));
        };
        scm.commit_locally_with_message(&commit_message(
            &self.host.config.repo_url,
            author,
            revision,
            commit,
            &picked.bugs,
        ))?;

        *did_finish = self.run_git_cl_command(&["upload", "-f"]).await?;
        obs::emit_land_step("upload", *did_finish);
        if *did_finish {
            let pull = self
                .host
                .executive
                .run_command(&["git".to_string(), "pull".to_string()], None)
                .await?;
            if !pull.success() {
                warn!(exit_code = pull.exit_code, "git pull failed");
            }
            let landed = self.run_git_cl_command(&["land", "-f", "-v"]).await?;
            obs::emit_land_step("land", landed);
        }
        Ok(changes)
    }

    async fn clean_up(&self, branch: &str, old_branch: &str, did_finish: bool) -> Result<()> {
        let scm = &self.host.scm;
        if did_finish {
            let config = self
                .host
                .executive
                .run_command(
                    &[
                        "git".to_string(),
                        "config".to_string(),
                        format!("branch.{branch}.rietveldissue"),
                    ],
                    None,
                )
                .await?;
            // The issue number is still recorded when landing did not go through.
            if config.success() && config.stdout.trim().parse::<u64>().is_ok() {
                self.run_git_cl_command(&["set_close"]).await?;
            }
        }
        scm.ensure_cleanly_tracking_remote_master()?;
        if !old_branch.is_empty() {
            scm.checkout_branch(old_branch)?;
        }
        scm.delete_branch(branch)
    }
}
