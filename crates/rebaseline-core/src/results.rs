//! Layout test results published by builders.
//!
//! Builders upload `failing_results.json`, a JSONP document of the form
//! `ADD_RESULTS({...});` whose `tests` member is a trie keyed by path
//! component. Leaves carry `expected`, `actual` and `is_unexpected`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RebaselineError, Result};
use crate::web::Web;

/// Baseline suffixes in the order they appear on command lines.
pub const BASELINE_SUFFIX_LIST: [&str; 3] = ["txt", "png", "wav"];

const JSONP_PREFIX: &str = "ADD_RESULTS(";
const JSONP_SUFFIX: &str = ");";

/// Result of one test on one builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub expected: String,
    pub actual: String,
    pub is_unexpected: bool,
}

impl TestResult {
    fn actual_tokens(&self) -> impl Iterator<Item = &str> {
        self.actual
            .split(|c: char| c.is_whitespace() || c == '+')
            .filter(|t| !t.is_empty())
    }

    pub fn did_pass(&self) -> bool {
        self.actual_tokens().any(|t| t == "PASS")
    }

    /// Baseline suffixes implied by the actual failure (`TEXT` → `txt`,
    /// `IMAGE` → `png`, `AUDIO` → `wav`), in [`BASELINE_SUFFIX_LIST`] order.
    pub fn suffixes_for_actual_failure(&self) -> Vec<&'static str> {
        let mut has = [false; 3];
        for token in self.actual_tokens() {
            match token {
                "TEXT" => has[0] = true,
                "IMAGE" => has[1] = true,
                "AUDIO" => has[2] = true,
                _ => {}
            }
        }
        BASELINE_SUFFIX_LIST
            .iter()
            .zip(has)
            .filter(|(_, present)| *present)
            .map(|(suffix, _)| *suffix)
            .collect()
    }
}

/// Parsed `failing_results.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutTestResults {
    root: Value,
}

impl LayoutTestResults {
    /// Parse JSONP (`ADD_RESULTS(...);`) or plain JSON.
    pub fn parse(contents: &str) -> Result<Self> {
        let trimmed = contents.trim();
        let json = match trimmed.strip_prefix(JSONP_PREFIX) {
            Some(rest) => rest
                .strip_suffix(JSONP_SUFFIX)
                .or_else(|| rest.strip_suffix(')'))
                .ok_or_else(|| {
                    RebaselineError::InvalidResults("unterminated ADD_RESULTS(".to_string())
                })?,
            None => trimmed,
        };
        let root: Value = serde_json::from_str(json)?;
        if !root.is_object() {
            return Err(RebaselineError::InvalidResults(
                "results root is not an object".to_string(),
            ));
        }
        Ok(LayoutTestResults { root })
    }

    /// Set the builder name when the document does not carry one.
    pub fn with_default_builder_name(mut self, builder_name: &str) -> Self {
        if let Value::Object(map) = &mut self.root {
            map.entry("builder_name")
                .or_insert_with(|| Value::String(builder_name.to_string()));
        }
        self
    }

    pub fn builder_name(&self) -> Option<&str> {
        self.root.get("builder_name").and_then(Value::as_str)
    }

    pub fn run_was_interrupted(&self) -> bool {
        self.root
            .get("interrupted")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// The Chromium commit position the run was built at.
    pub fn chromium_revision(&self) -> Option<u64> {
        match self.root.get("chromium_revision")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn result_for_test(&self, test: &str) -> Option<TestResult> {
        let mut node = self.root.get("tests")?;
        for component in test.split('/') {
            node = node.get(component)?;
        }
        let actual = node.get("actual")?.as_str()?.to_string();
        Some(TestResult {
            expected: node
                .get("expected")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            actual,
            is_unexpected: node
                .get("is_unexpected")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Every test path present in the trie, sorted.
    pub fn test_names(&self) -> Vec<String> {
        fn walk(prefix: &str, node: &Value, out: &mut Vec<String>) {
            let Some(map) = node.as_object() else {
                return;
            };
            if map.contains_key("actual") {
                out.push(prefix.to_string());
                return;
            }
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}/{key}")
                };
                walk(&path, child, out);
            }
        }

        let mut names = Vec::new();
        if let Some(tests) = self.root.get("tests") {
            walk("", tests, &mut names);
        }
        names.sort();
        names
    }
}

/// Where builder results come from.
#[async_trait]
pub trait BuilderResultsSource: Send + Sync {
    /// Directory URL holding the latest `-actual` files of `builder`.
    fn results_url(&self, builder: &str) -> Option<String>;

    /// Latest results of `builder`, or `None` when the builder has none.
    async fn latest_results(&self, builder: &str) -> Result<Option<LayoutTestResults>>;
}

/// Results served by a buildbot master.
pub struct BuildbotResults {
    server: String,
    web: Arc<dyn Web>,
}

impl BuildbotResults {
    pub fn new(server: impl Into<String>, web: Arc<dyn Web>) -> Self {
        BuildbotResults {
            server: server.into().trim_end_matches('/').to_string(),
            web,
        }
    }
}

#[async_trait]
impl BuilderResultsSource for BuildbotResults {
    fn results_url(&self, builder: &str) -> Option<String> {
        Some(format!(
            "{}/builders/{}/results/layout-test-results",
            self.server, builder
        ))
    }

    async fn latest_results(&self, builder: &str) -> Result<Option<LayoutTestResults>> {
        let Some(base) = self.results_url(builder) else {
            return Ok(None);
        };
        let url = format!("{base}/failing_results.json");
        debug!(builder = %builder, url = %url, "fetching results");
        let Some(body) = self.web.get_binary(&url).await? else {
            warn!(builder = %builder, "no results published");
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&body);
        Ok(Some(
            LayoutTestResults::parse(&text)?.with_default_builder_name(builder),
        ))
    }
}
