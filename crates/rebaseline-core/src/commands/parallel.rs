//! Rebaselining many (test, builder) pairs at once.
//!
//! Every orchestrating command ends up here with a
//! `test prefix → builder → suffixes` map. For each pair whose test
//! actually fails on the builder, the tool re-invokes itself twice: first
//! `copy-existing-baselines-internal` (all pairs in one concurrent batch),
//! then `rebaseline-test-internal`. The change sets printed by the children
//! are applied to source control, expectations for the rebaselined pairs
//! are dropped and, optionally, one `optimize-baselines` per test runs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::change_set::ChangeSet;
use crate::commands::{COPY_EXISTING_BASELINES, OPTIMIZE_BASELINES, REBASELINE_TEST};
use crate::error::Result;
use crate::executive::{BatchCommand, CommandOutput};
use crate::expectations::update_expectations_files;
use crate::host::Host;
use crate::obs;
use crate::results::{LayoutTestResults, BASELINE_SUFFIX_LIST};

/// `test prefix → builder → requested suffixes`.
pub type TestPrefixList = BTreeMap<String, BTreeMap<String, Vec<String>>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebaselineOptions {
    /// Run `optimize-baselines` after rebaselining.
    pub optimize: bool,
    pub verbose: bool,
    pub results_directory: Option<PathBuf>,
}

pub struct ParallelRebaseliner<'a> {
    host: &'a Host,
    options: RebaselineOptions,
    builder_data: Mutex<BTreeMap<String, Option<LayoutTestResults>>>,
}

struct Commands {
    copy: Vec<BatchCommand>,
    rebaseline: Vec<BatchCommand>,
    passing: ChangeSet,
}

impl<'a> ParallelRebaseliner<'a> {
    pub fn new(host: &'a Host, options: RebaselineOptions) -> Self {
        ParallelRebaseliner {
            host,
            options,
            builder_data: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn options(&self) -> &RebaselineOptions {
        &self.options
    }

    /// Latest results of `builder`, fetched once per run.
    pub async fn builder_results(&self, builder: &str) -> Result<Option<LayoutTestResults>> {
        if let Some(cached) = self.cached_results(builder) {
            return Ok(cached);
        }
        let results = self.host.results.latest_results(builder).await?;
        if let Ok(mut data) = self.builder_data.lock() {
            data.insert(builder.to_string(), results.clone());
        }
        Ok(results)
    }

    fn cached_results(&self, builder: &str) -> Option<Option<LayoutTestResults>> {
        self.builder_data
            .lock()
            .ok()
            .and_then(|data| data.get(builder).cloned())
    }

    /// Release builders first, then debug builders, keeping one builder per
    /// distinct baseline search path.
    pub fn builders_to_fetch_from(&self, builders: &[String]) -> Result<Vec<String>> {
        let (mut debug, mut release): (Vec<&String>, Vec<&String>) = builders
            .iter()
            .partition(|b| self.host.builders.is_debug(b));
        release.sort();
        release.dedup();
        debug.sort();
        debug.dedup();

        let mut seen_paths: Vec<Vec<String>> = Vec::new();
        let mut chosen = Vec::new();
        for builder in release.into_iter().chain(debug) {
            let port = self.host.port_for_builder(builder)?;
            let path = port.spec().baseline_search_path.clone();
            if !seen_paths.contains(&path) {
                seen_paths.push(path);
                chosen.push(builder.clone());
            }
        }
        Ok(chosen)
    }

    /// Requested suffixes the builder's actual failure calls for, in
    /// canonical order. Empty when the builder has no result for the test.
    pub async fn suffixes_for_actual_failures(
        &self,
        test: &str,
        builder: &str,
        requested: &[String],
    ) -> Result<Vec<String>> {
        let Some(results) = self.builder_results(builder).await? else {
            return Ok(Vec::new());
        };
        let Some(result) = results.result_for_test(test) else {
            return Ok(Vec::new());
        };
        Ok(result
            .suffixes_for_actual_failure()
            .into_iter()
            .filter(|s| requested.iter().any(|r| r == s))
            .map(str::to_string)
            .collect())
    }

    fn internal_command(&self, subcommand: &str, suffixes: &str, builder: &str, test: &str) -> Vec<String> {
        let mut args = self.host.tool_args(subcommand);
        args.extend(
            ["--suffixes", suffixes, "--builder", builder, "--test", test]
                .iter()
                .map(|s| s.to_string()),
        );
        if let Some(dir) = &self.options.results_directory {
            args.push("--results-directory".to_string());
            args.push(dir.display().to_string());
        }
        if self.options.verbose {
            args.push("--verbose".to_string());
        }
        args
    }

    async fn rebaseline_commands(&self, test_prefix_list: &TestPrefixList) -> Result<Commands> {
        let port = self.host.default_port()?;
        let cwd = self.host.config.checkout_root.clone();
        let mut commands = Commands {
            copy: Vec::new(),
            rebaseline: Vec::new(),
            passing: ChangeSet::new(),
        };

        for (prefix, builders) in test_prefix_list {
            let names: Vec<String> = builders.keys().cloned().collect();
            let fetch_from = self.builders_to_fetch_from(&names)?;
            for test in port.tests(std::slice::from_ref(prefix))? {
                for builder in &fetch_from {
                    let requested = builders.get(builder).map(Vec::as_slice).unwrap_or_default();
                    let suffixes = self
                        .suffixes_for_actual_failures(&test, builder, requested)
                        .await?;
                    if suffixes.is_empty() {
                        debug!(test = %test, builder = %builder, "passing, dropping expectations only");
                        commands.passing.remove_line(&test, builder);
                        continue;
                    }
                    let suffixes = suffixes.join(",");
                    commands.copy.push((
                        self.internal_command(COPY_EXISTING_BASELINES, &suffixes, builder, &test),
                        cwd.clone(),
                    ));
                    commands.rebaseline.push((
                        self.internal_command(REBASELINE_TEST, &suffixes, builder, &test),
                        cwd.clone(),
                    ));
                }
            }
        }
        Ok(commands)
    }

    async fn optimize_commands(&self, test_prefix_list: &TestPrefixList) -> Result<Vec<BatchCommand>> {
        let cwd = self.host.config.checkout_root.clone();
        let mut commands = Vec::new();
        for (test, builders) in test_prefix_list {
            let mut union = BTreeSet::new();
            for (builder, requested) in builders {
                union.extend(
                    self.suffixes_for_actual_failures(test, builder, requested)
                        .await?,
                );
            }
            let suffixes: Vec<&str> = BASELINE_SUFFIX_LIST
                .iter()
                .copied()
                .filter(|s| union.contains(*s))
                .collect();
            if suffixes.is_empty() {
                continue;
            }
            let mut args = self.host.tool_args(OPTIMIZE_BASELINES);
            args.push("--no-modify-scm".to_string());
            args.push("--suffixes".to_string());
            args.push(suffixes.join(","));
            args.push(test.clone());
            if self.options.verbose {
                args.push("--verbose".to_string());
            }
            commands.push((args, cwd.clone()));
        }
        Ok(commands)
    }

    /// Run one batch, relay the children's logs and apply the files they
    /// report to source control. Returns the merged change sets.
    async fn run_batch(&self, phase: &str, commands: Vec<BatchCommand>) -> Result<ChangeSet> {
        if commands.is_empty() {
            return Ok(ChangeSet::new());
        }
        obs::emit_batch_started(phase, commands.len());
        let outputs = self.host.executive.run_in_parallel(commands).await?;
        relay_child_logs(&outputs);

        let mut changes = ChangeSet::new();
        for output in &outputs {
            if !output.success() {
                warn!(phase = %phase, exit_code = output.exit_code, "child command failed");
            }
            changes.update(ChangeSet::from_output(&output.stdout));
        }
        let to_delete: Vec<PathBuf> = changes.delete.iter().map(PathBuf::from).collect();
        if !to_delete.is_empty() {
            self.host.scm.delete_list(&to_delete)?;
        }
        let to_add: Vec<PathBuf> = changes.add.iter().map(PathBuf::from).collect();
        if !to_add.is_empty() {
            self.host.scm.add_list(&to_add)?;
        }
        Ok(changes)
    }

    /// Rebaseline everything in `test_prefix_list`. Returns the lines that
    /// were removed from the expectations plus the files touched.
    pub async fn rebaseline(&self, test_prefix_list: &TestPrefixList) -> Result<ChangeSet> {
        let commands = self.rebaseline_commands(test_prefix_list).await?;
        info!(
            prefixes = test_prefix_list.len(),
            commands = commands.rebaseline.len(),
            "rebaselining"
        );

        let mut changes = self.run_batch(COPY_EXISTING_BASELINES, commands.copy).await?;
        changes.remove_lines.clear();
        changes.update(self.run_batch(REBASELINE_TEST, commands.rebaseline).await?);
        changes.update(commands.passing);

        let lines_to_remove = changes.lines_to_remove();
        if !lines_to_remove.is_empty() {
            update_expectations_files(self.host, &lines_to_remove)?;
        }

        if self.options.optimize {
            let optimize = self.optimize_commands(test_prefix_list).await?;
            changes.update(self.run_batch(OPTIMIZE_BASELINES, optimize).await?);
        }
        Ok(changes)
    }
}

fn relay_child_logs(outputs: &[CommandOutput]) {
    for output in outputs {
        for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
            info!(target: "child", "{line}");
        }
    }
}
