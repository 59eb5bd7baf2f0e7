//! `optimize-baselines`: drop redundant platform baselines of some tests.

use tracing::info;

use crate::change_set::ChangeSet;
use crate::error::Result;
use crate::host::Host;
use crate::optimizer::BaselineOptimizer;
use crate::port::expected_baseline_name;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeOptions {
    pub suffixes: Vec<String>,

    /// Change files on disk and report them instead of staging through SCM.
    pub no_modify_scm: bool,

    /// Only touch the directories of ports whose name starts with this.
    pub platform: Option<String>,
}

pub fn execute(host: &Host, options: &OptimizeOptions, test_prefixes: &[String]) -> Result<ChangeSet> {
    let optimizer = BaselineOptimizer::new(host, options.platform.as_deref());
    let tests = host.default_port()?.tests(test_prefixes)?;
    let mut changes = ChangeSet::new();
    for test in &tests {
        for suffix in &options.suffixes {
            let baseline_name = expected_baseline_name(test, suffix);
            changes.update(optimizer.optimize(&baseline_name, !options.no_modify_scm)?);
        }
    }
    info!(tests = tests.len(), deleted = changes.delete.len(), "optimized baselines");
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::mock_host;

    fn options(suffixes: &str, no_modify_scm: bool) -> OptimizeOptions {
        OptimizeOptions {
            suffixes: crate::commands::parse_suffixes(suffixes),
            no_modify_scm,
            platform: Some("test-mac-mac10.10".to_string()),
        }
    }

    fn setup() -> crate::fakes::FakeHost {
        let host = mock_host();
        host.write_layout_test_file("another/test.html", "Dummy test contents");
        host.write_layout_test_file("platform/test-mac-mac10.10/another/test-expected.txt", "result A");
        host.write_layout_test_file("another/test-expected.txt", "result A");
        host
    }

    #[test]
    fn test_modify_scm() {
        let host = setup();

        let changes = execute(&host, &options("txt", false), &["another/test.html".to_string()]).unwrap();

        assert!(changes.is_empty());
        assert_eq!(
            host.read_layout_test_file("platform/test-mac-mac10.10/another/test-expected.txt"),
            None
        );
        assert!(host.read_layout_test_file("another/test-expected.txt").is_some());
        assert_eq!(host.scm.deleted_paths().len(), 1);
    }

    #[test]
    fn test_no_modify_scm() {
        let host = setup();

        let changes = execute(&host, &options("txt", true), &["another/test.html".to_string()]).unwrap();

        assert_eq!(
            changes.to_json_line(),
            r#"{"add": [], "remove-lines": [], "delete": ["/mock-checkout/third_party/WebKit/LayoutTests/platform/test-mac-mac10.10/another/test-expected.txt"]}"#
        );
        assert!(host.scm.deleted_paths().is_empty());
        assert!(host.read_layout_test_file("another/test-expected.txt").is_some());
    }

    #[test]
    fn test_deletes_follow_suffix_order() {
        let host = setup();
        host.write_layout_test_file("platform/test-mac-mac10.10/another/test-expected.png", "result A png");
        host.write_layout_test_file("another/test-expected.png", "result A png");

        let changes =
            execute(&host, &options("txt,wav,png", true), &["another/test.html".to_string()]).unwrap();

        assert_eq!(
            changes.delete,
            vec![
                "/mock-checkout/third_party/WebKit/LayoutTests/platform/test-mac-mac10.10/another/test-expected.txt",
                "/mock-checkout/third_party/WebKit/LayoutTests/platform/test-mac-mac10.10/another/test-expected.png",
            ]
        );
        assert!(host.read_layout_test_file("another/test-expected.png").is_some());
    }
}
