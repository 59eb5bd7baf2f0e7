//! Blink rebaseline CLI
//!
//! The `blink-rebaseline` command keeps layout-test baselines and
//! `TestExpectations` in step with the bots.
//!
//! ## Commands
//!
//! - `rebaseline`: rebaseline test prefixes from a set of builders
//! - `rebaseline-json`: rebaseline a JSON test prefix list read from stdin
//! - `rebaseline-expectations`: rebaseline every test marked `Rebaseline`
//! - `auto-rebaseline`: rebaseline, commit and land `NeedsRebaseline` lines
//! - `rebaseline-o-matic`: run `auto-rebaseline` forever
//! - `optimize-baselines` / `analyze-baselines`: prune or inspect baselines
//! - `lint-expectations`: check the expectation files
//!
//! The `*-internal` subcommands are spawned by the orchestrating commands
//! and print a single change-set line on stdout.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rebaseline_core::commands::analyze::{self, AnalyzeOptions};
use rebaseline_core::commands::auto_rebaseline::{AutoRebaseline, AutoRebaselineOptions};
use rebaseline_core::commands::optimize::{self, OptimizeOptions};
use rebaseline_core::commands::parallel::RebaselineOptions;
use rebaseline_core::commands::rebaseline_o_matic::{RebaselineOMatic, WebLogSink};
use rebaseline_core::commands::{
    all_suffixes, copy_existing, lint, parse_suffixes, rebaseline, rebaseline_expectations,
    rebaseline_json, rebaseline_test, BaselineTarget,
};
use rebaseline_core::obs;
use rebaseline_core::{ChangeSet, Host, RebaselineConfig};
use tracing::{info, Instrument, Level};

#[derive(Parser, Debug)]
#[command(name = "blink-rebaseline")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Layout-test baseline and TestExpectations maintenance", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Root of the Chromium checkout
    #[arg(long, global = true, env = "REBASELINE_CHECKOUT_ROOT")]
    checkout_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Comma separated list of baseline suffixes
    #[arg(long, default_value = "txt,png,wav")]
    suffixes: String,

    /// Builder to pull results from
    #[arg(long)]
    builder: String,

    /// Test to rebaseline
    #[arg(long)]
    test: String,

    /// Local results directory to use instead of the builder's
    #[arg(long)]
    results_directory: Option<PathBuf>,
}

impl TargetArgs {
    fn target(&self) -> BaselineTarget {
        BaselineTarget {
            builder: self.builder.clone(),
            test: self.test.clone(),
            suffixes: parse_suffixes(&self.suffixes),
            results_directory: self.results_directory.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
struct ParallelArgs {
    /// Do not optimize the baselines after rebaselining
    #[arg(long)]
    no_optimize: bool,

    /// Local results directory to use instead of the builders'
    #[arg(long)]
    results_directory: Option<PathBuf>,
}

impl ParallelArgs {
    fn options(&self, verbose: bool) -> RebaselineOptions {
        RebaselineOptions {
            optimize: !self.no_optimize,
            verbose,
            results_directory: self.results_directory.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy baselines a new baseline would otherwise shadow (internal)
    CopyExistingBaselinesInternal(TargetArgs),

    /// Download the actual results of one test from one builder (internal)
    RebaselineTestInternal(TargetArgs),

    /// Remove redundant baselines of the given tests
    OptimizeBaselines {
        /// Comma separated list of baseline suffixes
        #[arg(long, default_value = "txt,png,wav")]
        suffixes: String,

        /// Leave source control untouched; print the change set instead
        #[arg(long)]
        no_modify_scm: bool,

        /// Only consider ports whose name starts with this
        #[arg(long)]
        platform: Option<String>,

        /// Tests or directories
        #[arg(required = true)]
        tests: Vec<String>,
    },

    /// Show where the baselines of the given tests live
    AnalyzeBaselines {
        /// Comma separated list of baseline suffixes
        #[arg(long, default_value = "txt,png,wav")]
        suffixes: String,

        /// Also report tests without any baseline
        #[arg(long)]
        missing: bool,

        /// Only consider ports whose name starts with this
        #[arg(long)]
        platform: Option<String>,

        /// Tests or directories
        #[arg(required = true)]
        tests: Vec<String>,
    },

    /// Rebaseline tests from a set of builders
    Rebaseline {
        /// Comma separated builders (default: every release builder)
        #[arg(long, value_delimiter = ',')]
        builders: Vec<String>,

        /// Comma separated list of baseline suffixes
        #[arg(long, default_value = "txt,png,wav")]
        suffixes: String,

        #[command(flatten)]
        parallel: ParallelArgs,

        /// Tests or directories
        #[arg(required = true)]
        tests: Vec<String>,
    },

    /// Rebaseline the `test → builder → suffixes` JSON read from stdin
    RebaselineJson {
        #[command(flatten)]
        parallel: ParallelArgs,
    },

    /// Rebaseline every test marked `Rebaseline` in the expectations
    RebaselineExpectations {
        /// Only consider ports whose name starts with this
        #[arg(long)]
        platform: Option<String>,

        #[command(flatten)]
        parallel: ParallelArgs,
    },

    /// Rebaseline `NeedsRebaseline` lines the bots have cycled through, then land
    AutoRebaseline {
        /// Rebaseline and update expectations, but do not commit or land
        #[arg(long)]
        dry_run: bool,

        /// Refresh token passed to `git cl`
        #[arg(long)]
        auth_refresh_token_json: Option<PathBuf>,

        #[command(flatten)]
        parallel: ParallelArgs,
    },

    /// Run `auto-rebaseline` in a loop, posting logs to the log server
    RebaselineOMatic {
        /// Stop after this many cycles
        #[arg(long)]
        max_iterations: Option<usize>,
    },

    /// Report unparseable or conflicting expectation lines
    LintExpectations,
}

impl Commands {
    /// Subcommand name as typed on the command line.
    fn name(&self) -> &'static str {
        match self {
            Commands::CopyExistingBaselinesInternal(_) => "copy-existing-baselines-internal",
            Commands::RebaselineTestInternal(_) => "rebaseline-test-internal",
            Commands::OptimizeBaselines { .. } => "optimize-baselines",
            Commands::AnalyzeBaselines { .. } => "analyze-baselines",
            Commands::Rebaseline { .. } => "rebaseline",
            Commands::RebaselineJson { .. } => "rebaseline-json",
            Commands::RebaselineExpectations { .. } => "rebaseline-expectations",
            Commands::AutoRebaseline { .. } => "auto-rebaseline",
            Commands::RebaselineOMatic { .. } => "rebaseline-o-matic",
            Commands::LintExpectations => "lint-expectations",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    rebaseline_core::init_tracing(cli.json, level);

    let config = match &cli.checkout_root {
        Some(root) => RebaselineConfig::for_checkout(root),
        None => RebaselineConfig::from_env(),
    };
    let mut host = Host::from_config(config).context("Failed to set up the rebaseline host")?;
    if let Some(root) = &cli.checkout_root {
        host.tool_command.push("--checkout-root".to_string());
        host.tool_command.push(root.display().to_string());
    }

    run(&host, cli.command, cli.verbose).await
}

async fn run(host: &Host, command: Commands, verbose: bool) -> Result<()> {
    let span = obs::command_span(command.name());
    run_command(host, command, verbose).instrument(span).await
}

async fn run_command(host: &Host, command: Commands, verbose: bool) -> Result<()> {
    match command {
        Commands::CopyExistingBaselinesInternal(args) => {
            let changes = copy_existing::execute(host, &args.target())
                .with_context(|| format!("Failed to copy baselines of {}", args.test))?;
            print_change_set(&changes);
        }
        Commands::RebaselineTestInternal(args) => {
            let changes = rebaseline_test::execute(host, &args.target())
                .await
                .with_context(|| format!("Failed to rebaseline {}", args.test))?;
            print_change_set(&changes);
        }
        Commands::OptimizeBaselines {
            suffixes,
            no_modify_scm,
            platform,
            tests,
        } => {
            let options = OptimizeOptions {
                suffixes: parse_suffixes(&suffixes),
                no_modify_scm,
                platform,
            };
            let changes = optimize::execute(host, &options, &tests)?;
            if no_modify_scm {
                print_change_set(&changes);
            }
        }
        Commands::AnalyzeBaselines {
            suffixes,
            missing,
            platform,
            tests,
        } => {
            let options = AnalyzeOptions {
                suffixes: parse_suffixes(&suffixes),
                missing,
                platform,
            };
            for line in analyze::execute(host, &options, &tests)? {
                println!("{line}");
            }
        }
        Commands::Rebaseline {
            builders,
            suffixes,
            parallel,
            tests,
        } => {
            let suffixes = match parse_suffixes(&suffixes) {
                s if s.is_empty() => all_suffixes(),
                s => s,
            };
            rebaseline::execute(host, parallel.options(verbose), &builders, &suffixes, &tests).await?;
        }
        Commands::RebaselineJson { parallel } => {
            let mut json = String::new();
            std::io::stdin()
                .read_to_string(&mut json)
                .context("Failed to read the test prefix list from stdin")?;
            rebaseline_json::execute(host, parallel.options(verbose), &json).await?;
        }
        Commands::RebaselineExpectations { platform, parallel } => {
            rebaseline_expectations::execute(host, parallel.options(verbose), platform.as_deref())
                .await?;
        }
        Commands::AutoRebaseline {
            dry_run,
            auth_refresh_token_json,
            parallel,
        } => {
            let options = AutoRebaselineOptions {
                rebaseline: parallel.options(verbose),
                dry_run,
                auth_refresh_token_json,
            };
            AutoRebaseline::new(host, options).execute().await?;
        }
        Commands::RebaselineOMatic { max_iterations } => {
            let sink = Arc::new(WebLogSink::new(
                host.web.clone(),
                host.config.log_server_url.clone(),
            ));
            info!(log_server = %host.config.log_server_url, "starting rebaseline-o-matic");
            RebaselineOMatic::new(host, sink, verbose)
                .run(max_iterations, &mut std::io::stdout())
                .await?;
        }
        Commands::LintExpectations => {
            let failures = lint::execute(host)?;
            if !failures.is_empty() {
                bail!("{} lint error(s) in the expectation files", failures.len());
            }
            println!("Lint succeeded.");
        }
    }
    Ok(())
}

/// Change sets go to stdout; the orchestrator parses them from there.
fn print_change_set(changes: &ChangeSet) {
    println!("{}", changes.to_json_line());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebaseline_core::fakes::{mock_host, ExecutiveCall};

    #[test]
    fn test_internal_subcommand_arguments() {
        let cli = Cli::try_parse_from([
            "blink-rebaseline",
            "rebaseline-test-internal",
            "--suffixes",
            "txt,png",
            "--builder",
            "MOCK Win7",
            "--test",
            "fast/a.html",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Commands::RebaselineTestInternal(args) = cli.command else {
            panic!("wrong subcommand");
        };
        assert_eq!(
            args.target(),
            BaselineTarget {
                builder: "MOCK Win7".to_string(),
                test: "fast/a.html".to_string(),
                suffixes: vec!["txt".to_string(), "png".to_string()],
                results_directory: None,
            }
        );
    }

    #[test]
    fn test_rebaseline_builders_are_comma_separated() {
        let cli = Cli::try_parse_from([
            "blink-rebaseline",
            "rebaseline",
            "--builders",
            "MOCK Win7,MOCK Win10",
            "--no-optimize",
            "fast/dom",
        ])
        .unwrap();

        let Commands::Rebaseline {
            builders,
            parallel,
            tests,
            ..
        } = cli.command
        else {
            panic!("wrong subcommand");
        };
        assert_eq!(builders, vec!["MOCK Win7", "MOCK Win10"]);
        assert!(!parallel.options(false).optimize);
        assert_eq!(tests, vec!["fast/dom"]);
    }

    #[test]
    fn test_command_name_matches_subcommand() {
        for name in ["lint-expectations", "rebaseline-o-matic", "rebaseline-json"] {
            let cli = Cli::try_parse_from(["blink-rebaseline", name]).unwrap();
            assert_eq!(cli.command.name(), name);
        }
    }

    #[test]
    fn test_optimize_requires_tests() {
        assert!(Cli::try_parse_from(["blink-rebaseline", "optimize-baselines"]).is_err());
    }

    #[tokio::test]
    async fn test_lint_fails_on_invalid_lines() {
        let host = mock_host();
        host.write_layout_test_file("TestExpectations", "[ Nonsense ] fast/b.html [ Failure ]\n");

        let result = run(&host, Commands::LintExpectations, false).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_rebaseline_o_matic_single_iteration() {
        let host = mock_host();

        run(
            &host,
            Commands::RebaselineOMatic {
                max_iterations: Some(1),
            },
            false,
        )
        .await
        .unwrap();

        assert_eq!(host.executive.calls()[0], ExecutiveCall::single(&["git", "pull"]));
        assert_eq!(host.web.posts().len(), 1);
    }
}
