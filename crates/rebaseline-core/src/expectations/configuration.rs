//! Test configurations and the specifier ↔ configuration conversion.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildType {
    Release,
    Debug,
}

impl BuildType {
    pub const ALL: [BuildType; 2] = [BuildType::Release, BuildType::Debug];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Release => "Release",
            BuildType::Debug => "Debug",
        }
    }

    /// Case-insensitive parse of a specifier token.
    pub fn parse(token: &str) -> Option<Self> {
        BuildType::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (version, build type) pair a directive can apply to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestConfiguration {
    pub version: String,
    pub build_type: BuildType,
}

impl TestConfiguration {
    pub fn new(version: &str, build_type: BuildType) -> Self {
        TestConfiguration {
            version: version.to_string(),
            build_type,
        }
    }
}

impl fmt::Display for TestConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}, {}>", self.version, self.build_type)
    }
}

/// A recognised specifier, in canonical casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    Version(String),
    Macro(String),
    BuildType(BuildType),
}

impl Specifier {
    pub fn token(&self) -> &str {
        match self {
            Specifier::Version(v) | Specifier::Macro(v) => v,
            Specifier::BuildType(b) => b.as_str(),
        }
    }
}

/// Converts between specifier lists and configuration sets for one catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationConverter {
    versions: Vec<String>,
    macros: BTreeMap<String, Vec<String>>,
}

impl ConfigurationConverter {
    pub fn new(versions: Vec<String>, macros: BTreeMap<String, Vec<String>>) -> Self {
        ConfigurationConverter { versions, macros }
    }

    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    pub fn resolve(&self, token: &str) -> Option<Specifier> {
        if let Some(build_type) = BuildType::parse(token) {
            return Some(Specifier::BuildType(build_type));
        }
        if let Some(version) = self.versions.iter().find(|v| v.eq_ignore_ascii_case(token)) {
            return Some(Specifier::Version(version.clone()));
        }
        self.macros
            .keys()
            .find(|m| m.eq_ignore_ascii_case(token))
            .map(|m| Specifier::Macro(m.clone()))
    }

    pub fn all_configurations(&self) -> BTreeSet<TestConfiguration> {
        self.versions
            .iter()
            .flat_map(|v| BuildType::ALL.into_iter().map(move |b| TestConfiguration::new(v, b)))
            .collect()
    }

    /// Versions × build types selected by `specifiers`; an empty category
    /// selects everything in it.
    pub fn to_configurations(&self, specifiers: &[Specifier]) -> BTreeSet<TestConfiguration> {
        let mut versions: BTreeSet<&str> = BTreeSet::new();
        let mut build_types: BTreeSet<BuildType> = BTreeSet::new();
        for specifier in specifiers {
            match specifier {
                Specifier::Version(v) => {
                    versions.insert(v);
                }
                Specifier::Macro(m) => {
                    if let Some(expansion) = self.macros.get(m) {
                        versions.extend(expansion.iter().map(String::as_str));
                    }
                }
                Specifier::BuildType(b) => {
                    build_types.insert(*b);
                }
            }
        }
        if versions.is_empty() {
            versions = self.versions.iter().map(String::as_str).collect();
        }
        if build_types.is_empty() {
            build_types = BuildType::ALL.into_iter().collect();
        }
        versions
            .iter()
            .flat_map(|v| build_types.iter().map(move |b| TestConfiguration::new(v, *b)))
            .collect()
    }

    /// Shortest specifier lists covering exactly `configurations`.
    ///
    /// Versions sharing the same set of build types form one group (one
    /// output line). Within a group macros replace their versions when all
    /// of them are present, version tokens are sorted, and the build type
    /// is appended only when the group does not cover every build type.
    pub fn to_specifier_groups(
        &self,
        configurations: &BTreeSet<TestConfiguration>,
    ) -> Vec<Vec<String>> {
        let mut by_version: BTreeMap<&str, BTreeSet<BuildType>> = BTreeMap::new();
        for config in configurations {
            by_version
                .entry(config.version.as_str())
                .or_default()
                .insert(config.build_type);
        }

        let mut groups: BTreeMap<Vec<BuildType>, BTreeSet<&str>> = BTreeMap::new();
        for (version, build_types) in by_version {
            groups
                .entry(build_types.into_iter().collect())
                .or_default()
                .insert(version);
        }

        let all_versions: BTreeSet<&str> = self.versions.iter().map(String::as_str).collect();
        let mut ordered: Vec<(Vec<BuildType>, BTreeSet<&str>)> = groups.into_iter().collect();
        ordered.sort_by_key(|(build_types, _)| std::cmp::Reverse(build_types.len()));

        ordered
            .into_iter()
            .map(|(build_types, versions)| {
                let mut tokens = if versions == all_versions {
                    Vec::new()
                } else {
                    self.collapse_macros(&versions)
                };
                tokens.sort();
                if build_types.len() < BuildType::ALL.len() {
                    tokens.extend(build_types.iter().map(|b| b.as_str().to_string()));
                }
                tokens
            })
            .collect()
    }

    fn collapse_macros(&self, versions: &BTreeSet<&str>) -> Vec<String> {
        let mut remaining = versions.clone();
        let mut tokens = Vec::new();
        for (name, expansion) in &self.macros {
            if !expansion.is_empty() && expansion.iter().all(|v| remaining.contains(v.as_str())) {
                for v in expansion {
                    remaining.remove(v.as_str());
                }
                tokens.push(name.clone());
            }
        }
        tokens.extend(remaining.into_iter().map(str::to_string));
        tokens
    }
}
