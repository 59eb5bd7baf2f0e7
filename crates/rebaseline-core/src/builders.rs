//! Builder bots running layout tests.
//!
//! Keeps the list of builders on the waterfall that TestExpectations cares
//! about, with the port each one runs and its expectation specifiers. The
//! table is hard coded but can be replaced from a JSON file (same shape as
//! [`BuilderRegistry::to_json_string`]) or built directly in tests.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RebaselineError, Result};

/// One builder entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderInfo {
    /// Fully qualified port name, e.g. `mac-mac10.10`.
    pub port_name: String,

    /// TestExpectations specifiers for the builder's configuration.
    #[serde(default)]
    pub specifiers: Vec<String>,

    /// Directory under `platform/` to put baselines in instead of the port's
    /// own directory. Used when a configuration has no bot of its own yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebaseline_override_dir: Option<String>,
}

impl BuilderInfo {
    pub fn new(port_name: &str, specifiers: &[&str]) -> Self {
        BuilderInfo {
            port_name: port_name.to_string(),
            specifiers: specifiers.iter().map(|s| s.to_string()).collect(),
            rebaseline_override_dir: None,
        }
    }
}

/// Builder name → port association.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuilderRegistry {
    exact_matches: BTreeMap<String, BuilderInfo>,
}

impl BuilderRegistry {
    /// Registry over an explicit table.
    pub fn new(exact_matches: BTreeMap<String, BuilderInfo>) -> Self {
        BuilderRegistry { exact_matches }
    }

    /// Build a registry from `(name, info)` pairs.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, BuilderInfo)>,
    {
        BuilderRegistry {
            exact_matches: entries.into_iter().collect(),
        }
    }

    /// The Chromium WebKit waterfall.
    pub fn chromium() -> Self {
        let entries = [
            ("WebKit Win7", BuilderInfo::new("win-win7", &["Win7", "Release"])),
            ("WebKit Win7 (dbg)", BuilderInfo::new("win-win7", &["Win7", "Debug"])),
            ("WebKit Win10", BuilderInfo::new("win-win10", &["Win10", "Release"])),
            ("WebKit Linux", BuilderInfo::new("linux-precise", &["Precise", "Release"])),
            ("WebKit Linux Trusty", BuilderInfo::new("linux-trusty", &["Trusty", "Release"])),
            ("WebKit Linux (dbg)", BuilderInfo::new("linux-precise", &["Precise", "Debug"])),
            ("WebKit Mac10.9", BuilderInfo::new("mac-mac10.9", &["Mac10.9", "Release"])),
            ("WebKit Mac10.10", BuilderInfo::new("mac-mac10.10", &["Mac10.10", "Release"])),
            ("WebKit Mac10.11", BuilderInfo::new("mac-mac10.11", &["Mac10.11", "Release"])),
            ("WebKit Mac10.11 (dbg)", BuilderInfo::new("mac-mac10.11", &["Mac10.11", "Debug"])),
            ("WebKit Mac10.11 (retina)", BuilderInfo::new("mac-retina", &["Retina", "Release"])),
            ("WebKit Android (Nexus4)", BuilderInfo::new("android", &["Android", "Release"])),
        ];
        Self::from_entries(entries.into_iter().map(|(n, i)| (n.to_string(), i)))
    }

    /// Parse a registry from JSON (`{"name": {"port_name": ..., "specifiers": [...]}}`).
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a registry from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Serialize the table back to JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builder name with whitespace, parentheses and dots replaced by `_`,
    /// suitable for paths and URLs.
    pub fn builder_path_from_name(builder_name: &str) -> String {
        // The pattern is a literal; failure to compile would be a programming error
        // caught by the unit tests below.
        match Regex::new(r"[\s().]") {
            Ok(re) => re.replace_all(builder_name, "_").into_owned(),
            Err(_) => builder_name.to_string(),
        }
    }

    /// All builder names, sorted.
    pub fn all_builder_names(&self) -> Vec<String> {
        self.exact_matches.keys().cloned().collect()
    }

    /// All port names, sorted and de-duplicated.
    pub fn all_port_names(&self) -> Vec<String> {
        self.exact_matches
            .values()
            .map(|info| info.port_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn contains(&self, builder_name: &str) -> bool {
        self.exact_matches.contains_key(builder_name)
    }

    pub fn info(&self, builder_name: &str) -> Result<&BuilderInfo> {
        self.exact_matches
            .get(builder_name)
            .ok_or_else(|| RebaselineError::UnknownBuilder(builder_name.to_string()))
    }

    pub fn rebaseline_override_dir(&self, builder_name: &str) -> Result<Option<&str>> {
        Ok(self.info(builder_name)?.rebaseline_override_dir.as_deref())
    }

    pub fn port_name_for_builder_name(&self, builder_name: &str) -> Result<&str> {
        Ok(self.info(builder_name)?.port_name.as_str())
    }

    pub fn specifiers_for_builder(&self, builder_name: &str) -> Result<&[String]> {
        Ok(self.info(builder_name)?.specifiers.as_slice())
    }

    /// Builder running `port_name`, preferring a release builder over a
    /// `dbg` one.
    pub fn builder_name_for_port_name(&self, port_name: &str) -> Option<&str> {
        let mut debug_builder_name = None;
        for (builder_name, info) in &self.exact_matches {
            if info.port_name == port_name {
                if builder_name.contains("dbg") {
                    debug_builder_name = Some(builder_name.as_str());
                } else {
                    return Some(builder_name.as_str());
                }
            }
        }
        debug_builder_name
    }

    /// Path-safe name of the builder running `port_name`.
    pub fn builder_path_for_port_name(&self, port_name: &str) -> Option<String> {
        self.builder_name_for_port_name(port_name)
            .map(Self::builder_path_from_name)
    }

    /// Whether the builder produces debug results.
    ///
    /// Explicit `Debug`/`Release` specifiers win; otherwise the name decides.
    pub fn is_debug(&self, builder_name: &str) -> bool {
        if let Some(info) = self.exact_matches.get(builder_name) {
            if info.specifiers.iter().any(|s| s.eq_ignore_ascii_case("debug")) {
                return true;
            }
            if info.specifiers.iter().any(|s| s.eq_ignore_ascii_case("release")) {
                return false;
            }
        }
        builder_name.contains("dbg") || builder_name.contains("Debug")
    }

    /// Release builders that are not sanitizer bots, sorted.
    pub fn release_builders(&self) -> Vec<String> {
        self.exact_matches
            .keys()
            .filter(|name| !name.contains("ASAN"))
            .filter(|name| !self.is_debug(name))
            .cloned()
            .collect()
    }
}
