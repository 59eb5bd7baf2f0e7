//! Change sets exchanged between the orchestrating commands and the
//! internal subcommands they spawn.
//!
//! Every internal subcommand prints exactly one line of the form
//!
//! ```text
//! {"add": [...], "remove-lines": [{"test": ..., "builder": ...}], "delete": [...]}
//! ```
//!
//! on stdout. The orchestrator merges the lines of every child.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One `(test, builder)` pair whose expectations can be dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineToRemove {
    pub test: String,
    pub builder: String,
}

/// Files to add to or delete from source control, and expectation lines to
/// remove. Entries keep insertion order and are never duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub add: Vec<String>,

    #[serde(default, rename = "remove-lines")]
    pub remove_lines: Vec<LineToRemove>,

    #[serde(default)]
    pub delete: Vec<String>,
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: &Path) {
        push_unique(&mut self.add, path.display().to_string());
    }

    pub fn delete_file(&mut self, path: &Path) {
        push_unique(&mut self.delete, path.display().to_string());
    }

    pub fn remove_line(&mut self, test: &str, builder: &str) {
        push_unique(
            &mut self.remove_lines,
            LineToRemove {
                test: test.to_string(),
                builder: builder.to_string(),
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove_lines.is_empty() && self.delete.is_empty()
    }

    /// Fold `other` into this change set.
    pub fn update(&mut self, other: ChangeSet) {
        for path in other.add {
            push_unique(&mut self.add, path);
        }
        for line in other.remove_lines {
            push_unique(&mut self.remove_lines, line);
        }
        for path in other.delete {
            push_unique(&mut self.delete, path);
        }
    }

    /// `test → builders` view of `remove-lines`.
    pub fn lines_to_remove(&self) -> BTreeMap<String, Vec<String>> {
        let mut lines: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for line in &self.remove_lines {
            push_unique(lines.entry(line.test.clone()).or_default(), line.builder.clone());
        }
        lines
    }

    /// Parse one output line. Lines that are not a JSON object are ignored.
    pub fn from_json_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(change_set) => Some(change_set),
            Err(err) => {
                debug!(error = %err, "ignoring unparseable output line");
                None
            }
        }
    }

    /// Merge every change-set line found in a child's stdout.
    pub fn from_output(stdout: &str) -> Self {
        let mut merged = ChangeSet::new();
        for change_set in stdout.lines().filter_map(Self::from_json_line) {
            merged.update(change_set);
        }
        merged
    }

    /// Single-line JSON with `", "` and `": "` separators.
    pub fn to_json_line(&self) -> String {
        let remove_lines: Vec<String> = self
            .remove_lines
            .iter()
            .map(|line| {
                format!(
                    "{{\"test\": {}, \"builder\": {}}}",
                    quote(&line.test),
                    quote(&line.builder)
                )
            })
            .collect();
        format!(
            "{{\"add\": [{}], \"remove-lines\": [{}], \"delete\": [{}]}}",
            quote_all(&self.add),
            remove_lines.join(", "),
            quote_all(&self.delete)
        )
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn quote_all(values: &[String]) -> String {
    values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_change_set_line() {
        assert_eq!(
            ChangeSet::new().to_json_line(),
            r#"{"add": [], "remove-lines": [], "delete": []}"#
        );
    }

    #[test]
    fn test_remove_lines_format() {
        let mut changes = ChangeSet::new();
        changes.remove_line("failures/expected/image.html", "MOCK Win10");
        changes.remove_line("failures/expected/image.html", "MOCK Win10");
        assert_eq!(
            changes.to_json_line(),
            r#"{"add": [], "remove-lines": [{"test": "failures/expected/image.html", "builder": "MOCK Win10"}], "delete": []}"#
        );
    }

    #[test]
    fn test_missing_keys_are_tolerated() {
        let changes = ChangeSet::from_output(
            "MOCK STDOUT\n{\"add\": [], \"remove-lines\": [{\"test\": \"a.html\", \"builder\": \"WebKit Mac10.11\"}]}\n",
        );
        assert!(changes.delete.is_empty());
        assert_eq!(
            changes.lines_to_remove(),
            BTreeMap::from([("a.html".to_string(), vec!["WebKit Mac10.11".to_string()])])
        );
    }

    #[test]
    fn test_update_merges_without_duplicates() {
        let mut first = ChangeSet::new();
        first.add_file(Path::new("/a-expected.txt"));
        let mut second = ChangeSet::new();
        second.add_file(Path::new("/a-expected.txt"));
        second.delete_file(Path::new("/b-expected.png"));

        first.update(second);

        assert_eq!(first.add, vec!["/a-expected.txt"]);
        assert_eq!(first.delete, vec!["/b-expected.png"]);
    }

    #[test]
    fn test_escapes_strings() {
        let mut changes = ChangeSet::new();
        changes.add_file(Path::new("/dir/with \"quote\""));
        assert!(changes.to_json_line().contains(r#""/dir/with \"quote\"""#));
        assert_eq!(ChangeSet::from_json_line(&changes.to_json_line()), Some(changes));
    }
}
