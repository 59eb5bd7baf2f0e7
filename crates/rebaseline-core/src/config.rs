//! Tool configuration.
//!
//! Defaults point at the Chromium infrastructure; every value can be
//! overridden through `REBASELINE_*` environment variables or the CLI.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default buildbot master serving layout test results.
pub const DEFAULT_RESULTS_SERVER: &str = "https://build.chromium.org/p/chromium.webkit";

/// Default tree status endpoint.
pub const DEFAULT_TREE_STATUS_URL: &str = "https://chromium-status.appspot.com/status";

/// Default rebaseline log server.
pub const DEFAULT_LOG_SERVER: &str = "https://blinkrebaseline.appspot.com/updatelog";

/// Default repository used in commit message links.
pub const DEFAULT_REPO_URL: &str = "https://chromium.googlesource.com/chromium/src";

/// Runtime configuration for the rebaseline tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RebaselineConfig {
    /// Root of the source checkout.
    pub checkout_root: PathBuf,

    /// Layout tests directory relative to the checkout root.
    pub layout_tests_subdir: PathBuf,

    /// Buildbot master URL; builder results live below `<server>/builders/<name>`.
    pub results_server: String,

    /// Tree status endpoint consulted before landing.
    pub tree_status_url: String,

    /// Endpoint receiving rebaseline-o-matic log lines.
    pub log_server_url: String,

    /// Repository URL used to link the rebaselined commit.
    pub repo_url: String,

    /// Optional JSON file replacing the built-in builder table.
    pub builders_file: Option<PathBuf>,

    /// Optional JSON file replacing the built-in platform catalog.
    pub platforms_file: Option<PathBuf>,
}

impl Default for RebaselineConfig {
    fn default() -> Self {
        RebaselineConfig {
            checkout_root: std::env::var("REBASELINE_CHECKOUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            layout_tests_subdir: PathBuf::from("third_party/WebKit/LayoutTests"),
            results_server: std::env::var("REBASELINE_RESULTS_SERVER")
                .unwrap_or_else(|_| DEFAULT_RESULTS_SERVER.to_string()),
            tree_status_url: std::env::var("REBASELINE_TREE_STATUS_URL")
                .unwrap_or_else(|_| DEFAULT_TREE_STATUS_URL.to_string()),
            log_server_url: std::env::var("REBASELINE_LOG_SERVER")
                .unwrap_or_else(|_| DEFAULT_LOG_SERVER.to_string()),
            repo_url: std::env::var("REBASELINE_REPO_URL")
                .unwrap_or_else(|_| DEFAULT_REPO_URL.to_string()),
            builders_file: std::env::var("REBASELINE_BUILDERS_FILE")
                .ok()
                .map(PathBuf::from),
            platforms_file: std::env::var("REBASELINE_PLATFORMS_FILE")
                .ok()
                .map(PathBuf::from),
        }
    }
}

impl RebaselineConfig {
    /// Create a config from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create a config rooted at a specific checkout, ignoring the environment
    /// for the checkout location.
    pub fn for_checkout(checkout_root: impl Into<PathBuf>) -> Self {
        RebaselineConfig {
            checkout_root: checkout_root.into(),
            ..Self::default()
        }
    }

    /// Absolute layout tests directory.
    pub fn layout_tests_dir(&self) -> PathBuf {
        self.checkout_root.join(&self.layout_tests_subdir)
    }
}
