//! In-memory collaborators for tests.
//!
//! [`mock_host`] wires a [`Host`] over the small `test-*` platform catalog;
//! [`mock_chromium_host`] uses the real Chromium catalog and waterfall. Both
//! return a [`FakeHost`] that dereferences to the [`Host`] and keeps typed
//! handles on every fake so tests can inspect what happened.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::builders::{BuilderInfo, BuilderRegistry};
use crate::change_set::ChangeSet;
use crate::commands::REBASELINE_TEST;
use crate::config::{RebaselineConfig, DEFAULT_LOG_SERVER, DEFAULT_REPO_URL, DEFAULT_TREE_STATUS_URL};
use crate::error::{RebaselineError, Result};
use crate::executive::{BatchCommand, CommandOutput, Executive, Watched};
use crate::filesystem::FileSystem;
use crate::host::Host;
use crate::port::PlatformCatalog;
use crate::results::{BuilderResultsSource, LayoutTestResults};
use crate::scm::Scm;
use crate::web::Web;

/// Body served by [`StaticWeb`] for any URL without a canned response.
pub const MOCK_WEB_RESULT: &str = "MOCK Web result, convert 404 to None=True";

/// Stdout of every command run by [`RecordingExecutive`] by default.
pub const MOCK_STDOUT: &str = "MOCK STDOUT";

pub const MOCK_CHECKOUT: &str = "/mock-checkout";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// File system held in a map.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    written: Mutex<BTreeSet<PathBuf>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a file without recording it as written.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        lock(&self.files).insert(path.into(), contents.into());
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        lock(&self.files).get(path).cloned()
    }

    /// Paths written through [`FileSystem::write_binary`], sorted.
    pub fn written_files(&self) -> Vec<PathBuf> {
        lock(&self.written).iter().cloned().collect()
    }

    pub fn clear_written_files(&self) {
        lock(&self.written).clear();
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path) || self.is_dir(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        lock(&self.files)
            .keys()
            .any(|file| file != path && file.starts_with(path))
    }

    fn read_binary(&self, path: &Path) -> Result<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| RebaselineError::FileNotFound(path.to_path_buf()))
    }

    fn write_binary(&self, path: &Path, data: &[u8]) -> Result<()> {
        lock(&self.files).insert(path.to_path_buf(), data.to_vec());
        lock(&self.written).insert(path.to_path_buf());
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        lock(&self.files)
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RebaselineError::FileNotFound(path.to_path_buf()))
    }

    fn files_under(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(lock(&self.files)
            .keys()
            .filter(|file| *file != dir && file.starts_with(dir))
            .cloned()
            .collect())
    }
}

#[derive(Debug)]
struct ScmState {
    /// `None` treats every path as tracked.
    tracked: Option<BTreeSet<PathBuf>>,
    added: Vec<PathBuf>,
    deleted: Vec<PathBuf>,
    local_commits: Vec<String>,
    operations: Vec<String>,
    blame: String,
    current_branch: String,
    working_directory_changes: bool,
    commit_positions: BTreeMap<String, u64>,
}

/// Source control over a [`MemoryFileSystem`], recording what it was asked
/// to do.
#[derive(Debug)]
pub struct MemoryScm {
    filesystem: Arc<MemoryFileSystem>,
    state: Mutex<ScmState>,
}

impl MemoryScm {
    pub fn new(filesystem: Arc<MemoryFileSystem>) -> Self {
        let commit_positions = [("6469e754a1", 1234), ("624c3081c0", 5678), ("624caaaaaa", 10000)]
            .into_iter()
            .map(|(commit, position)| (commit.to_string(), position))
            .collect();
        MemoryScm {
            filesystem,
            state: Mutex::new(ScmState {
                tracked: None,
                added: Vec::new(),
                deleted: Vec::new(),
                local_commits: Vec::new(),
                operations: Vec::new(),
                blame: String::new(),
                current_branch: "mock-branch".to_string(),
                working_directory_changes: false,
                commit_positions,
            }),
        }
    }

    /// Only paths passed to [`MemoryScm::track`] or `add_list` exist from now on.
    pub fn track_only_listed(&self) {
        lock(&self.state).tracked.get_or_insert_with(BTreeSet::new);
    }

    pub fn track(&self, path: impl Into<PathBuf>) {
        lock(&self.state)
            .tracked
            .get_or_insert_with(BTreeSet::new)
            .insert(path.into());
    }

    pub fn added_paths(&self) -> Vec<PathBuf> {
        lock(&self.state).added.clone()
    }

    pub fn deleted_paths(&self) -> Vec<PathBuf> {
        lock(&self.state).deleted.clone()
    }

    pub fn local_commits(&self) -> Vec<String> {
        lock(&self.state).local_commits.clone()
    }

    /// Branch operations in order, e.g. `checkout main`.
    pub fn operations(&self) -> Vec<String> {
        lock(&self.state).operations.clone()
    }

    pub fn set_blame(&self, blame: &str) {
        lock(&self.state).blame = blame.to_string();
    }

    pub fn set_current_branch(&self, branch: &str) {
        lock(&self.state).current_branch = branch.to_string();
    }

    pub fn set_working_directory_changes(&self, changes: bool) {
        lock(&self.state).working_directory_changes = changes;
    }

    pub fn set_commit_position(&self, commit: &str, position: u64) {
        lock(&self.state)
            .commit_positions
            .insert(commit.to_string(), position);
    }

    fn record(&self, operation: String) {
        lock(&self.state).operations.push(operation);
    }
}

impl Scm for MemoryScm {
    fn add_list(&self, paths: &[PathBuf]) -> Result<()> {
        let mut state = lock(&self.state);
        for path in paths {
            state.added.push(path.clone());
            if let Some(tracked) = &mut state.tracked {
                tracked.insert(path.clone());
            }
        }
        Ok(())
    }

    fn delete_list(&self, paths: &[PathBuf]) -> Result<()> {
        for path in paths {
            // Deleting an untracked-on-disk path is not an error for git rm -f.
            let _ = self.filesystem.remove(path);
        }
        let mut state = lock(&self.state);
        for path in paths {
            state.deleted.push(path.clone());
            if let Some(tracked) = &mut state.tracked {
                tracked.remove(path);
            }
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        lock(&self.state)
            .tracked
            .as_ref()
            .map_or(true, |tracked| tracked.contains(path))
    }

    fn has_working_directory_changes(&self) -> Result<bool> {
        Ok(lock(&self.state).working_directory_changes)
    }

    fn current_branch_or_ref(&self) -> Result<String> {
        Ok(lock(&self.state).current_branch.clone())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        self.record(format!("delete_branch {name}"));
        Ok(())
    }

    fn create_clean_branch(&self, name: &str) -> Result<()> {
        self.record(format!("create_clean_branch {name}"));
        lock(&self.state).current_branch = name.to_string();
        Ok(())
    }

    fn checkout_branch(&self, name: &str) -> Result<()> {
        self.record(format!("checkout {name}"));
        lock(&self.state).current_branch = name.to_string();
        Ok(())
    }

    fn commit_locally_with_message(&self, message: &str) -> Result<()> {
        self.record("commit".to_string());
        lock(&self.state).local_commits.push(message.to_string());
        Ok(())
    }

    fn ensure_cleanly_tracking_remote_master(&self) -> Result<()> {
        self.record("ensure_cleanly_tracking_remote_master".to_string());
        Ok(())
    }

    fn blame(&self, _path: &Path) -> Result<String> {
        Ok(lock(&self.state).blame.clone())
    }

    fn commit_position_from_git_commit(&self, commit: &str) -> Option<u64> {
        lock(&self.state).commit_positions.get(commit).copied()
    }
}

/// A call made on [`RecordingExecutive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutiveCall {
    Single(Vec<String>),
    /// One `run_in_parallel` batch.
    Parallel(Vec<Vec<String>>),
}

impl ExecutiveCall {
    pub fn single(args: &[&str]) -> Self {
        ExecutiveCall::Single(args.iter().map(|s| s.to_string()).collect())
    }
}

/// [`Executive`] that records command lines instead of running them.
#[derive(Debug, Default)]
pub struct RecordingExecutive {
    calls: Mutex<Vec<ExecutiveCall>>,
    line_removing: Mutex<bool>,
    hang_on: Mutex<Vec<String>>,
    fail_on: Mutex<Vec<String>>,
}

impl RecordingExecutive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `rebaseline-test-internal` children report that their
    /// (test, builder) expectation line can go.
    pub fn line_removing(&self) {
        *lock(&self.line_removing) = true;
    }

    /// Commands whose joined command line starts with `prefix` hang.
    pub fn hang_on(&self, prefix: &str) {
        lock(&self.hang_on).push(prefix.to_string());
    }

    /// Commands whose joined command line starts with `prefix` exit with 1.
    pub fn fail_on(&self, prefix: &str) {
        lock(&self.fail_on).push(prefix.to_string());
    }

    pub fn calls(&self) -> Vec<ExecutiveCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn matches(prefixes: &Mutex<Vec<String>>, args: &[String]) -> bool {
        let command = args.join(" ");
        lock(prefixes).iter().any(|p| command.starts_with(p.as_str()))
    }

    fn output_for(&self, args: &[String]) -> CommandOutput {
        if Self::matches(&self.fail_on, args) {
            return CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "MOCK ERROR".to_string(),
            };
        }
        if *lock(&self.line_removing) && args.iter().any(|a| a == REBASELINE_TEST) {
            let value_of = |flag: &str| {
                args.iter()
                    .position(|a| a == flag)
                    .and_then(|i| args.get(i + 1))
                    .cloned()
                    .unwrap_or_default()
            };
            let mut changes = ChangeSet::new();
            changes.remove_line(&value_of("--test"), &value_of("--builder"));
            return CommandOutput {
                exit_code: 0,
                stdout: format!("{}\n", changes.to_json_line()),
                stderr: String::new(),
            };
        }
        CommandOutput {
            exit_code: 0,
            stdout: format!("{MOCK_STDOUT}\n"),
            stderr: String::new(),
        }
    }
}

#[async_trait]
impl Executive for RecordingExecutive {
    async fn run_command(&self, args: &[String], _cwd: Option<&Path>) -> Result<CommandOutput> {
        lock(&self.calls).push(ExecutiveCall::Single(args.to_vec()));
        Ok(self.output_for(args))
    }

    async fn run_in_parallel(&self, commands: Vec<BatchCommand>) -> Result<Vec<CommandOutput>> {
        let outputs = commands.iter().map(|(args, _)| self.output_for(args)).collect();
        lock(&self.calls).push(ExecutiveCall::Parallel(
            commands.into_iter().map(|(args, _)| args).collect(),
        ));
        Ok(outputs)
    }

    async fn run_watched(&self, args: &[String], _limit: Duration) -> Result<Watched> {
        lock(&self.calls).push(ExecutiveCall::Single(args.to_vec()));
        if Self::matches(&self.hang_on, args) {
            return Ok(Watched::Hung);
        }
        Ok(Watched::Completed(self.output_for(args)))
    }
}

/// [`Web`] serving canned responses.
#[derive(Debug, Default)]
pub struct StaticWeb {
    responses: Mutex<BTreeMap<String, Option<Vec<u8>>>>,
    fetched: Mutex<Vec<String>>,
    posts: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl StaticWeb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`; `None` acts like a 404.
    pub fn set_response(&self, url: &str, body: Option<&str>) {
        lock(&self.responses).insert(url.to_string(), body.map(|b| b.as_bytes().to_vec()));
    }

    pub fn urls_fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }

    pub fn posts(&self) -> Vec<(String, Vec<(String, String)>)> {
        lock(&self.posts).clone()
    }
}

#[async_trait]
impl Web for StaticWeb {
    async fn get_binary(&self, url: &str) -> Result<Option<Vec<u8>>> {
        lock(&self.fetched).push(url.to_string());
        Ok(lock(&self.responses)
            .get(url)
            .cloned()
            .unwrap_or_else(|| Some(MOCK_WEB_RESULT.as_bytes().to_vec())))
    }

    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<String> {
        let fields = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        lock(&self.posts).push((url.to_string(), fields));
        Ok(String::new())
    }
}

/// Builder results set up by the test.
#[derive(Debug, Default)]
pub struct StaticResults {
    results: Mutex<BTreeMap<String, LayoutTestResults>>,
    without_url: Mutex<BTreeSet<String>>,
}

impl StaticResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `json` (`ADD_RESULTS(...)` or plain) as the latest results of
    /// `builder`.
    pub fn set_results(&self, builder: &str, json: &str) -> Result<()> {
        let results = LayoutTestResults::parse(json)?.with_default_builder_name(builder);
        lock(&self.results).insert(builder.to_string(), results);
        Ok(())
    }

    pub fn remove_results_url(&self, builder: &str) {
        lock(&self.without_url).insert(builder.to_string());
    }
}

#[async_trait]
impl BuilderResultsSource for StaticResults {
    fn results_url(&self, builder: &str) -> Option<String> {
        if lock(&self.without_url).contains(builder) {
            return None;
        }
        Some(format!(
            "http://example.com/f/builders/{builder}/results/layout-test-results"
        ))
    }

    async fn latest_results(&self, builder: &str) -> Result<Option<LayoutTestResults>> {
        Ok(lock(&self.results).get(builder).cloned())
    }
}

/// A [`Host`] over in-memory fakes.
pub struct FakeHost {
    host: Host,
    pub filesystem: Arc<MemoryFileSystem>,
    pub scm: Arc<MemoryScm>,
    pub executive: Arc<RecordingExecutive>,
    pub web: Arc<StaticWeb>,
    pub results: Arc<StaticResults>,
}

impl FakeHost {
    pub fn new(catalog: PlatformCatalog, builders: BuilderRegistry) -> Self {
        let filesystem = Arc::new(MemoryFileSystem::new());
        let scm = Arc::new(MemoryScm::new(filesystem.clone()));
        let executive = Arc::new(RecordingExecutive::new());
        let web = Arc::new(StaticWeb::new());
        let results = Arc::new(StaticResults::new());
        let config = RebaselineConfig {
            checkout_root: PathBuf::from(MOCK_CHECKOUT),
            layout_tests_subdir: PathBuf::from("third_party/WebKit/LayoutTests"),
            results_server: "http://example.com/f".to_string(),
            tree_status_url: DEFAULT_TREE_STATUS_URL.to_string(),
            log_server_url: DEFAULT_LOG_SERVER.to_string(),
            repo_url: DEFAULT_REPO_URL.to_string(),
            builders_file: None,
            platforms_file: None,
        };
        let host = Host {
            filesystem: filesystem.clone(),
            executive: executive.clone(),
            scm: scm.clone(),
            web: web.clone(),
            results: results.clone(),
            builders,
            catalog,
            config,
            tool_command: vec![format!("{MOCK_CHECKOUT}/blink-rebaseline")],
        };
        FakeHost {
            host,
            filesystem,
            scm,
            executive,
            web,
            results,
        }
    }

    /// Write a file relative to the layout tests directory.
    pub fn write_layout_test_file(&self, relative: &str, contents: &str) {
        self.filesystem
            .insert(self.host.layout_tests_dir().join(relative), contents);
    }

    pub fn read_layout_test_file(&self, relative: &str) -> Option<String> {
        self.filesystem
            .get(&self.host.layout_tests_dir().join(relative))
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Deref for FakeHost {
    type Target = Host;

    fn deref(&self) -> &Host {
        &self.host
    }
}

impl DerefMut for FakeHost {
    fn deref_mut(&mut self) -> &mut Host {
        &mut self.host
    }
}

/// Host over the `test-*` ports with one `MOCK` release builder per port.
pub fn mock_host() -> FakeHost {
    let builders = [
        ("MOCK Mac10.10", "test-mac-mac10.10", "Mac10.10"),
        ("MOCK Mac10.11", "test-mac-mac10.11", "Mac10.11"),
        ("MOCK Win7", "test-win-win7", "Win7"),
        ("MOCK Win10", "test-win-win10", "Win10"),
        ("MOCK Precise", "test-linux-precise", "Precise"),
        ("MOCK Trusty", "test-linux-trusty", "Trusty"),
    ];
    let registry = BuilderRegistry::from_entries(builders.iter().map(|(name, port, version)| {
        (name.to_string(), BuilderInfo::new(port, &[version, "Release"]))
    }));
    FakeHost::new(PlatformCatalog::test_ports(), registry)
}

/// Host over the Chromium ports and waterfall.
pub fn mock_chromium_host() -> FakeHost {
    FakeHost::new(PlatformCatalog::chromium(), BuilderRegistry::chromium())
}
