//! Platform catalog and ports.
//!
//! A port is one test configuration (e.g. `mac-mac10.10`) together with the
//! ordered list of `platform/` directories searched for its baselines. The
//! search paths also define the platform hierarchy used by the optimizer:
//! the parent of `search_path[i]` is `search_path[i + 1]` and the parent of
//! the last entry is the generic `LayoutTests/` directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RebaselineError, Result};
use crate::expectations::{BuildType, ConfigurationConverter, ExpectationsFile, TestConfiguration};
use crate::host::Host;

/// Extensions of files the test runner treats as tests.
const TEST_EXTENSIONS: &[&str] = &["html", "htm", "xhtml", "xht", "shtml", "svg", "php", "pl", "mht"];

/// Directory names never holding tests.
const SKIPPED_DIRECTORIES: &[&str] = &[
    ".svn", "_svn", "platform", "resources", "support", "script-tests", "reference", "reftest",
];

/// Basename suffixes marking expectations, actual results and references.
const NON_TEST_SUFFIXES: &[&str] = &["-expected", "-expected-mismatch", "-actual", "-ref", "-notref"];

/// File listing the tests run by smoke-test-only ports.
pub const SMOKE_TESTS_FILE: &str = "SmokeTests";

/// One port of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,

    /// Configuration version specifier, e.g. `Mac10.10`.
    pub version: String,

    /// `platform/` directory names, most specific first.
    pub baseline_search_path: Vec<String>,

    /// Only the tests listed in `SmokeTests` run on this port.
    #[serde(default)]
    pub smoke_tests_only: bool,
}

impl PortSpec {
    fn new(name: &str, version: &str, search_path: &[&str]) -> Self {
        PortSpec {
            name: name.to_string(),
            version: version.to_string(),
            baseline_search_path: search_path.iter().map(|s| s.to_string()).collect(),
            smoke_tests_only: false,
        }
    }

    fn smoke_tests_only(mut self) -> Self {
        self.smoke_tests_only = true;
        self
    }
}

fn default_expectations_files() -> Vec<String> {
    vec!["TestExpectations".to_string()]
}

fn default_override_files() -> Vec<String> {
    vec!["NeverFixTests".to_string(), "SlowTests".to_string()]
}

/// Every port, the version macros and the expectation files shared by them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCatalog {
    pub ports: Vec<PortSpec>,

    /// Macro specifier → the versions it stands for.
    #[serde(default)]
    pub macros: BTreeMap<String, Vec<String>>,

    /// Generic expectation files, relative to the layout tests directory.
    /// The first one is the file the updater rewrites.
    #[serde(default = "default_expectations_files")]
    pub expectations_files: Vec<String>,

    /// Files layered on top of the generic expectations (`NeverFixTests`, ...).
    #[serde(default = "default_override_files")]
    pub override_files: Vec<String>,
}

impl PlatformCatalog {
    /// The Chromium layout test ports.
    pub fn chromium() -> Self {
        let ports = vec![
            PortSpec::new("mac-mac10.9", "Mac10.9", &["mac-mac10.9", "mac-mac10.10", "mac"]),
            PortSpec::new("mac-mac10.10", "Mac10.10", &["mac-mac10.10", "mac"]),
            PortSpec::new("mac-mac10.11", "Mac10.11", &["mac"]),
            PortSpec::new("mac-retina", "Retina", &["mac-retina", "mac"]),
            PortSpec::new("win-win7", "Win7", &["win-win7", "win"]),
            PortSpec::new("win-win10", "Win10", &["win"]),
            PortSpec::new("linux-precise", "Precise", &["linux-precise", "linux", "win"]),
            PortSpec::new("linux-trusty", "Trusty", &["linux", "win"]),
            PortSpec::new("android", "Android", &["android", "linux", "win"]).smoke_tests_only(),
        ];
        let macros = [
            ("Mac", vec!["Mac10.9", "Mac10.10", "Mac10.11", "Retina"]),
            ("Win", vec!["Win7", "Win10"]),
            ("Linux", vec!["Precise", "Trusty"]),
        ];
        Self::assemble(ports, &macros)
    }

    /// Small catalog of `test-*` ports for exercising the commands.
    pub fn test_ports() -> Self {
        let ports = vec![
            PortSpec::new("test-mac-mac10.10", "Mac10.10", &["test-mac-mac10.10", "test-mac-mac10.11"]),
            PortSpec::new("test-mac-mac10.11", "Mac10.11", &["test-mac-mac10.11"]),
            PortSpec::new("test-win-win7", "Win7", &["test-win-win7"]),
            PortSpec::new("test-win-win10", "Win10", &["test-win-win10"]),
            PortSpec::new(
                "test-linux-precise",
                "Precise",
                &["test-linux-precise", "test-linux-trusty", "test-win-win7"],
            ),
            PortSpec::new("test-linux-trusty", "Trusty", &["test-linux-trusty", "test-win-win7"]),
        ];
        let macros = [
            ("Mac", vec!["Mac10.10", "Mac10.11"]),
            ("Win", vec!["Win7", "Win10"]),
            ("Linux", vec!["Precise", "Trusty"]),
        ];
        Self::assemble(ports, &macros)
    }

    fn assemble(ports: Vec<PortSpec>, macros: &[(&str, Vec<&str>)]) -> Self {
        PlatformCatalog {
            ports,
            macros: macros
                .iter()
                .map(|(name, versions)| {
                    (name.to_string(), versions.iter().map(|v| v.to_string()).collect())
                })
                .collect(),
            expectations_files: default_expectations_files(),
            override_files: default_override_files(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: PlatformCatalog = serde_json::from_str(json)?;
        if catalog.ports.is_empty() {
            return Err(RebaselineError::Config("platform catalog has no ports".to_string()));
        }
        Ok(catalog)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn port_spec(&self, name: &str) -> Result<&PortSpec> {
        self.ports
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| RebaselineError::UnknownPort(name.to_string()))
    }

    pub fn all_port_names(&self) -> Vec<String> {
        self.ports.iter().map(|p| p.name.clone()).collect()
    }

    /// Distinct versions in catalog order.
    pub fn versions(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.ports
            .iter()
            .filter(|p| seen.insert(p.version.clone()))
            .map(|p| p.version.clone())
            .collect()
    }

    pub fn converter(&self) -> ConfigurationConverter {
        ConfigurationConverter::new(self.versions(), self.macros.clone())
    }

    /// Port whose primary baseline directory is `platform_dir`.
    pub fn port_for_primary_baseline(&self, platform_dir: &str) -> Result<&PortSpec> {
        self.ports
            .iter()
            .find(|p| p.baseline_search_path.first().map(String::as_str) == Some(platform_dir))
            .ok_or_else(|| RebaselineError::NoPortForBaseline(platform_dir.to_string()))
    }

    /// Platform directories whose search path lists `platform_dir` right
    /// after their own primary directory.
    pub fn immediate_predecessors_in_fallback(&self, platform_dir: &str) -> Vec<String> {
        let mut predecessors = Vec::new();
        for port in &self.ports {
            let path = &port.baseline_search_path;
            if let Some(index) = path.iter().position(|d| d == platform_dir) {
                if index > 0 && !predecessors.contains(&path[index - 1]) {
                    predecessors.push(path[index - 1].clone());
                }
            }
        }
        predecessors
    }

    /// Every platform directory, most specific first within each port.
    pub fn platform_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = Vec::new();
        for port in &self.ports {
            for dir in &port.baseline_search_path {
                if !dirs.contains(dir) {
                    dirs.push(dir.clone());
                }
            }
        }
        dirs
    }

    /// Parent of `platform_dir` in the hierarchy; `None` means the generic
    /// directory. The first port listing the directory decides.
    pub fn parent_of(&self, platform_dir: &str) -> Option<&str> {
        for port in &self.ports {
            let path = &port.baseline_search_path;
            if let Some(index) = path.iter().position(|d| d == platform_dir) {
                return path.get(index + 1).map(String::as_str);
            }
        }
        None
    }
}

/// Name of `test` without its extension.
pub fn test_root(test: &str) -> &str {
    let basename_start = test.rfind('/').map(|i| i + 1).unwrap_or(0);
    match test[basename_start..].rfind('.') {
        Some(dot) => &test[..basename_start + dot],
        None => test,
    }
}

/// `foo/bar.html` + `txt` → `foo/bar-expected.txt`.
pub fn expected_baseline_name(test: &str, suffix: &str) -> String {
    format!("{}-expected.{}", test_root(test), suffix)
}

/// `foo/bar.html` + `txt` → `foo/bar-actual.txt`.
pub fn actual_result_name(test: &str, suffix: &str) -> String {
    format!("{}-actual.{}", test_root(test), suffix)
}

/// Whether the layout-tests-relative `path` names a test file.
pub fn is_test_file(path: &str) -> bool {
    let mut components: Vec<&str> = path.split('/').collect();
    let Some(basename) = components.pop() else {
        return false;
    };
    if components.iter().any(|c| SKIPPED_DIRECTORIES.contains(c)) {
        return false;
    }
    let Some((stem, extension)) = basename.rsplit_once('.') else {
        return false;
    };
    TEST_EXTENSIONS.contains(&extension)
        && !NON_TEST_SUFFIXES.iter().any(|suffix| stem.ends_with(suffix))
}

/// A port bound to a host.
#[derive(Clone, Copy)]
pub struct Port<'a> {
    host: &'a Host,
    spec: &'a PortSpec,
}

impl<'a> Port<'a> {
    pub fn new(host: &'a Host, spec: &'a PortSpec) -> Self {
        Port { host, spec }
    }

    pub fn name(&self) -> &'a str {
        &self.spec.name
    }

    pub fn version(&self) -> &'a str {
        &self.spec.version
    }

    pub fn spec(&self) -> &'a PortSpec {
        self.spec
    }

    pub fn layout_tests_dir(&self) -> PathBuf {
        self.host.layout_tests_dir()
    }

    /// Release configuration of this port's version.
    pub fn test_configuration(&self) -> TestConfiguration {
        TestConfiguration::new(&self.spec.version, BuildType::Release)
    }

    /// Absolute baseline directories, most specific first.
    pub fn baseline_search_path(&self) -> Vec<PathBuf> {
        let platform = self.layout_tests_dir().join("platform");
        self.spec
            .baseline_search_path
            .iter()
            .map(|d| platform.join(d))
            .collect()
    }

    /// The directory this port's new baselines go to.
    pub fn baseline_version_dir(&self) -> PathBuf {
        let platform = self.layout_tests_dir().join("platform");
        match self.spec.baseline_search_path.first() {
            Some(dir) => platform.join(dir),
            None => self.layout_tests_dir(),
        }
    }

    pub fn path_to_generic_test_expectations_file(&self) -> PathBuf {
        self.host.path_to_generic_test_expectations_file()
    }

    pub fn path_to_smoke_tests_file(&self) -> PathBuf {
        self.layout_tests_dir().join(SMOKE_TESTS_FILE)
    }

    /// Generic expectation files followed by the override files.
    pub fn expectations_files(&self, include_overrides: bool) -> Vec<PathBuf> {
        let dir = self.layout_tests_dir();
        let mut files: Vec<PathBuf> = self
            .host
            .catalog
            .expectations_files
            .iter()
            .map(|f| dir.join(f))
            .collect();
        if include_overrides {
            files.extend(self.host.catalog.override_files.iter().map(|f| dir.join(f)));
        }
        files
    }

    /// Resolved baseline for `test`: the first copy along the search path,
    /// else the generic location (which may not exist).
    pub fn expected_filename(&self, test: &str, suffix: &str) -> PathBuf {
        let name = expected_baseline_name(test, suffix);
        for dir in self.baseline_search_path() {
            let candidate = dir.join(&name);
            if self.host.filesystem.exists(&candidate) {
                return candidate;
            }
        }
        self.layout_tests_dir().join(name)
    }

    /// Reference files making `test` a reftest.
    pub fn reference_files(&self, test: &str) -> Vec<PathBuf> {
        let root = test_root(test);
        ["-expected.html", "-expected-mismatch.html"]
            .iter()
            .map(|suffix| format!("{root}{suffix}"))
            .flat_map(|name| {
                let mut found: Vec<PathBuf> = self
                    .baseline_search_path()
                    .into_iter()
                    .map(|dir| dir.join(&name))
                    .collect();
                found.push(self.layout_tests_dir().join(&name));
                found
                    .into_iter()
                    .find(|path| self.host.filesystem.exists(path))
            })
            .collect()
    }

    /// Expand test prefixes (files or directories) into test names, sorted.
    /// Prefixes that do not exist expand to nothing.
    pub fn tests(&self, prefixes: &[String]) -> Result<Vec<String>> {
        let dir = self.layout_tests_dir();
        let mut tests = BTreeSet::new();
        for prefix in prefixes {
            let prefix = prefix.trim_end_matches('/');
            let path = dir.join(prefix);
            if self.host.filesystem.is_dir(&path) {
                for file in self.host.filesystem.files_under(&path)? {
                    if let Some(relative) = relative_test_name(&dir, &file) {
                        if is_test_file(&relative) {
                            tests.insert(relative);
                        }
                    }
                }
            } else if self.host.filesystem.exists(&path) {
                tests.insert(prefix.to_string());
            }
        }
        Ok(tests.into_iter().collect())
    }

    /// Whether the port never runs `test`: a smoke-test-only port whose
    /// `SmokeTests` file does not list it, or an override file marking it
    /// `Skip`/`WontFix` for this port.
    pub fn skips_test(&self, test: &str) -> Result<bool> {
        if self.spec.smoke_tests_only {
            let smoke_tests = self.path_to_smoke_tests_file();
            if self.host.filesystem.exists(&smoke_tests) {
                let listed = self.host.filesystem.read_text(&smoke_tests)?;
                if !listed.lines().any(|line| line.trim() == test) {
                    return Ok(true);
                }
            }
        }
        self.skipped_in(&self.override_files(), test)
    }

    /// Whether any expectation file (generic or override) skips `test` here.
    pub fn is_skipped_by_expectations(&self, test: &str) -> Result<bool> {
        self.skipped_in(&self.expectations_files(true), test)
    }

    /// Whether a directive of this port's expectations marks `test` with
    /// `expectation`.
    pub fn has_expectation(&self, test: &str, expectation: &str) -> Result<bool> {
        let config = self.test_configuration();
        for file in self.parsed_expectations(&self.expectations_files(true))? {
            if file
                .lines_for_test(test)
                .any(|line| line.matches_configuration(&config) && line.has_expectation(expectation))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Tests (directory lines expanded) whose directives for this port carry
    /// `expectation`, sorted.
    pub fn tests_with_expectation(&self, expectation: &str) -> Result<Vec<String>> {
        let config = self.test_configuration();
        let mut names = Vec::new();
        for file in self.parsed_expectations(&self.expectations_files(true))? {
            for line in file.lines() {
                if let Some(name) = line.name() {
                    if line.matches_configuration(&config) && line.has_expectation(expectation) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        let mut tests = BTreeSet::new();
        for name in names {
            let expanded = self.tests(std::slice::from_ref(&name))?;
            if expanded.is_empty() {
                tests.insert(name);
            } else {
                tests.extend(expanded);
            }
        }
        Ok(tests.into_iter().collect())
    }

    fn override_files(&self) -> Vec<PathBuf> {
        let dir = self.layout_tests_dir();
        self.host
            .catalog
            .override_files
            .iter()
            .map(|f| dir.join(f))
            .collect()
    }

    fn skipped_in(&self, files: &[PathBuf], test: &str) -> Result<bool> {
        let config = self.test_configuration();
        for file in self.parsed_expectations(files)? {
            if file
                .lines_for_test(test)
                .any(|line| line.matches_configuration(&config) && line.is_skip())
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn parsed_expectations(&self, files: &[PathBuf]) -> Result<Vec<ExpectationsFile>> {
        let converter = self.host.converter();
        let mut parsed = Vec::new();
        for path in files {
            if self.host.filesystem.exists(path) {
                let contents = self.host.filesystem.read_text(path)?;
                parsed.push(ExpectationsFile::parse(&contents, &converter));
            }
        }
        Ok(parsed)
    }
}

fn relative_test_name(layout_tests_dir: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(layout_tests_dir).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_and_actual_names() {
        assert_eq!(
            expected_baseline_name("userscripts/another-test.html", "txt"),
            "userscripts/another-test-expected.txt"
        );
        assert_eq!(
            actual_result_name("fast/dom/a.b/test.svg", "png"),
            "fast/dom/a.b/test-actual.png"
        );
        assert_eq!(test_root("noextension"), "noextension");
    }

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file("fast/dom/prototype-taco.html"));
        assert!(is_test_file("userscripts/images.svg"));
        assert!(!is_test_file("fast/dom/prototype-taco-expected.html"));
        assert!(!is_test_file("fast/dom/prototype-taco-expected-mismatch.html"));
        assert!(!is_test_file("fast/dom/prototype-taco-expected.txt"));
        assert!(!is_test_file("fast/dom/resources/helper.html"));
        assert!(!is_test_file("platform/mac/fast/test.html"));
        assert!(!is_test_file("fast/dom/README"));
    }

    #[test]
    fn test_chromium_hierarchy() {
        let catalog = PlatformCatalog::chromium();
        assert_eq!(catalog.parent_of("mac-mac10.9"), Some("mac-mac10.10"));
        assert_eq!(catalog.parent_of("mac"), None);
        assert_eq!(catalog.parent_of("linux"), Some("win"));
        assert_eq!(catalog.parent_of("android"), Some("linux"));
        assert_eq!(catalog.port_for_primary_baseline("mac").unwrap().name, "mac-mac10.11");
        assert!(matches!(
            catalog.port_for_primary_baseline("nowhere"),
            Err(RebaselineError::NoPortForBaseline(_))
        ));
    }

    #[test]
    fn test_immediate_predecessors() {
        let catalog = PlatformCatalog::test_ports();
        assert_eq!(
            catalog.immediate_predecessors_in_fallback("test-win-win7"),
            vec!["test-linux-trusty"]
        );
        assert_eq!(
            catalog.immediate_predecessors_in_fallback("test-mac-mac10.11"),
            vec!["test-mac-mac10.10"]
        );
        assert!(catalog
            .immediate_predecessors_in_fallback("test-mac-mac10.10")
            .is_empty());
    }

    #[test]
    fn test_catalog_json_defaults() {
        let json = r#"{"ports": [{"name": "p", "version": "V1", "baseline_search_path": ["p"]}]}"#;
        let catalog = PlatformCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.expectations_files, vec!["TestExpectations"]);
        assert!(catalog.override_files.contains(&"NeverFixTests".to_string()));
        assert!(!catalog.ports[0].smoke_tests_only);
        assert!(PlatformCatalog::from_json_str(r#"{"ports": []}"#).is_err());
    }
}
