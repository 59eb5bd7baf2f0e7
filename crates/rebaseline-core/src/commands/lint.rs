//! `lint-expectations`: report unparseable and conflicting expectation lines.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::expectations::ExpectationsFile;
use crate::host::Host;

/// One problem found in an expectations file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFailure {
    pub path: PathBuf,
    /// 1-based.
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for LintFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} {}", self.path.display(), self.line, self.message)
    }
}

fn lint_file(path: &Path, file: &ExpectationsFile) -> Vec<LintFailure> {
    let mut failures: Vec<LintFailure> = file
        .invalid_lines()
        .into_iter()
        .map(|(line, message)| LintFailure {
            path: path.to_path_buf(),
            line,
            message,
        })
        .collect();
    for overlap in file.overlapping_entries() {
        failures.push(LintFailure {
            path: path.to_path_buf(),
            line: overlap.second_line,
            message: format!(
                "Duplicate or ambiguous entry lines {}:{} and {}:{}.",
                path.display(),
                overlap.first_line,
                path.display(),
                overlap.second_line
            ),
        });
    }
    failures.sort_by_key(|f| f.line);
    failures
}

/// Lint the generic expectations and the override files.
pub fn execute(host: &Host) -> Result<Vec<LintFailure>> {
    let converter = host.converter();
    let port = host.default_port()?;
    let mut failures = Vec::new();
    for path in port.expectations_files(true) {
        if !host.filesystem.exists(&path) {
            debug!(path = %path.display(), "no such expectations file");
            continue;
        }
        let file = ExpectationsFile::parse(&host.filesystem.read_text(&path)?, &converter);
        failures.extend(lint_file(&path, &file));
    }
    for failure in &failures {
        warn!("{failure}");
    }
    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::mock_host;

    #[test]
    fn test_clean_file_has_no_failures() {
        let host = mock_host();
        host.write_layout_test_file(
            "TestExpectations",
            "# comment\nBug(x) [ Mac ] fast/a.html [ Failure ]\nBug(x) [ Win ] fast/a.html [ Crash ]\n",
        );

        assert!(execute(&host).unwrap().is_empty());
    }

    #[test]
    fn test_reports_invalid_and_overlapping_lines() {
        let host = mock_host();
        host.write_layout_test_file(
            "TestExpectations",
            "Bug(x) [ Mac ] fast/a.html [ Failure ]\n[ Nonsense ] fast/b.html [ Failure ]\nBug(y) [ Mac10.10 ] fast/a.html [ Crash ]\n",
        );

        let failures = execute(&host).unwrap();

        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].line, 2);
        assert_eq!(failures[1].line, 3);
        assert!(failures[1].message.starts_with("Duplicate or ambiguous entry lines"));
    }

    #[test]
    fn test_override_files_are_linted() {
        let host = mock_host();
        host.write_layout_test_file("NeverFixTests", "fast/c.html [ WontFix Failure ]\n");

        let failures = execute(&host).unwrap();

        assert_eq!(failures.len(), 1);
        assert!(failures[0].path.ends_with("NeverFixTests"));
        assert!(failures[0].to_string().contains("NeverFixTests:1 "));
    }
}
