//! Subcommands of `blink-rebaseline`.
//!
//! The `*-internal` subcommands and `optimize-baselines` work on a single
//! test and print a [`ChangeSet`](crate::change_set::ChangeSet) line; the
//! orchestrating commands ([`parallel`] and everything built on it) spawn
//! them through the host's [`Executive`](crate::executive::Executive).

pub mod analyze;
pub mod auto_rebaseline;
pub mod copy_existing;
pub mod lint;
pub mod optimize;
pub mod parallel;
pub mod rebaseline;
pub mod rebaseline_expectations;
pub mod rebaseline_json;
pub mod rebaseline_o_matic;
pub mod rebaseline_test;

use std::path::PathBuf;

use crate::error::Result;
use crate::host::Host;
use crate::results::BASELINE_SUFFIX_LIST;

pub const COPY_EXISTING_BASELINES: &str = "copy-existing-baselines-internal";
pub const REBASELINE_TEST: &str = "rebaseline-test-internal";
pub const OPTIMIZE_BASELINES: &str = "optimize-baselines";
pub const AUTO_REBASELINE: &str = "auto-rebaseline";

/// Arguments shared by the two per-(test, builder) internal subcommands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineTarget {
    pub builder: String,
    pub test: String,
    pub suffixes: Vec<String>,

    /// Local directory holding `-actual` files, used instead of the
    /// builder's results URL.
    pub results_directory: Option<PathBuf>,
}

/// Split a comma separated suffix list, dropping empty entries.
pub fn parse_suffixes(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every baseline suffix.
pub fn all_suffixes() -> Vec<String> {
    BASELINE_SUFFIX_LIST.iter().map(|s| s.to_string()).collect()
}

/// Platform directory name new baselines from `builder` go to.
pub fn baseline_directory_name(host: &Host, builder: &str) -> Result<String> {
    if let Some(dir) = host.builders.rebaseline_override_dir(builder)? {
        return Ok(dir.to_string());
    }
    let port = host.port_for_builder(builder)?;
    Ok(port
        .spec()
        .baseline_search_path
        .first()
        .cloned()
        .unwrap_or_default())
}

/// Absolute directory new baselines from `builder` go to.
pub fn baseline_directory(host: &Host, builder: &str) -> Result<PathBuf> {
    let name = baseline_directory_name(host, builder)?;
    if name.is_empty() {
        return Ok(host.layout_tests_dir());
    }
    Ok(host.layout_tests_dir().join("platform").join(name))
}
