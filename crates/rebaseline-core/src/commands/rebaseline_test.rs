//! `rebaseline-test-internal`: download the actual results of one test on
//! one builder and store them as that builder's new baselines.

use tracing::{debug, error};

use crate::change_set::ChangeSet;
use crate::commands::{baseline_directory, BaselineTarget};
use crate::error::Result;
use crate::host::Host;
use crate::obs;
use crate::port::{actual_result_name, expected_baseline_name};

pub async fn execute(host: &Host, target: &BaselineTarget) -> Result<ChangeSet> {
    let mut changes = ChangeSet::new();
    let port = host.port_for_builder(&target.builder)?;
    if !port.reference_files(&target.test).is_empty() {
        error!("Cannot rebaseline reftest: {}", target.test);
        obs::emit_rebaseline_skipped(&target.test, "reftest");
        return Ok(changes);
    }

    let prefix = match &target.results_directory {
        Some(dir) => format!("file://{}", dir.display()),
        None => match host.results.results_url(&target.builder) {
            Some(url) => url,
            None => {
                error!(builder = %target.builder, "no results URL for builder");
                obs::emit_rebaseline_skipped(&target.test, "no results url");
                return Ok(changes);
            }
        },
    };

    let baseline_dir = baseline_directory(host, &target.builder)?;
    for suffix in &target.suffixes {
        let url = format!("{}/{}", prefix, actual_result_name(&target.test, suffix));
        let data = match host.web.get_binary(&url).await? {
            Some(data) if !data.is_empty() => data,
            _ => {
                debug!(url = %url, "no baseline");
                continue;
            }
        };
        let path = baseline_dir.join(expected_baseline_name(&target.test, suffix));
        host.filesystem.write_binary(&path, &data)?;
        obs::emit_baseline_written(&path.display().to_string(), data.len());
        if !host.scm.exists(&path) {
            changes.add_file(&path);
        }
    }

    changes.remove_line(&target.test, &target.builder);
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::builders::{BuilderInfo, BuilderRegistry};
    use crate::fakes::{mock_chromium_host, mock_host, MOCK_WEB_RESULT};

    const WEB_PREFIX: &str =
        "http://example.com/f/builders/WebKit Mac10.11/results/layout-test-results";

    fn target(builder: &str, suffixes: &str) -> BaselineTarget {
        BaselineTarget {
            builder: builder.to_string(),
            test: "userscripts/another-test.html".to_string(),
            suffixes: crate::commands::parse_suffixes(suffixes),
            results_directory: None,
        }
    }

    #[tokio::test]
    async fn test_fetches_every_suffix_from_results_url() {
        let host = mock_chromium_host();
        host.write_layout_test_file("userscripts/another-test.html", "Dummy test contents");

        let changes = execute(&host, &target("WebKit Mac10.11", "png,wav,txt"))
            .await
            .unwrap();

        assert_eq!(
            host.web.urls_fetched(),
            vec![
                format!("{WEB_PREFIX}/userscripts/another-test-actual.png"),
                format!("{WEB_PREFIX}/userscripts/another-test-actual.wav"),
                format!("{WEB_PREFIX}/userscripts/another-test-actual.txt"),
            ]
        );
        assert_eq!(
            host.read_layout_test_file("platform/mac/userscripts/another-test-expected.txt"),
            Some(MOCK_WEB_RESULT.to_string())
        );
        assert_eq!(changes.lines_to_remove().len(), 1);
    }

    #[tokio::test]
    async fn test_results_directory_uses_file_url() {
        let host = mock_chromium_host();
        let mut target = target("WebKit Mac10.11", "txt");
        target.results_directory = Some(PathBuf::from("/tmp"));

        execute(&host, &target).await.unwrap();

        assert_eq!(
            host.web.urls_fetched(),
            vec!["file:///tmp/userscripts/another-test-actual.txt"]
        );
    }

    #[tokio::test]
    async fn test_reftest_is_not_rebaselined() {
        let host = mock_chromium_host();
        host.write_layout_test_file("userscripts/another-test.html", "test data");
        host.write_layout_test_file("userscripts/another-test-expected.html", "generic result");

        let changes = execute(&host, &target("WebKit Mac10.11", "txt"))
            .await
            .unwrap();

        assert!(changes.is_empty());
        assert!(host.web.urls_fetched().is_empty());
    }

    #[tokio::test]
    async fn test_new_files_are_added_to_scm() {
        let host = mock_chromium_host();
        host.scm.track_only_listed();

        let changes = execute(&host, &target("WebKit Linux Trusty", "txt"))
            .await
            .unwrap();

        assert_eq!(
            changes.add,
            vec!["/mock-checkout/third_party/WebKit/LayoutTests/platform/linux/userscripts/another-test-expected.txt"]
        );
    }

    #[tokio::test]
    async fn test_missing_result_writes_nothing() {
        let host = mock_chromium_host();
        host.web
            .set_response(&format!("{WEB_PREFIX}/userscripts/another-test-actual.txt"), None);

        let changes = execute(&host, &target("WebKit Mac10.11", "txt"))
            .await
            .unwrap();

        assert_eq!(
            host.read_layout_test_file("platform/mac/userscripts/another-test-expected.txt"),
            None
        );
        assert_eq!(changes.remove_lines.len(), 1);
    }

    #[tokio::test]
    async fn test_builder_without_results_url() {
        let host = mock_chromium_host();
        host.results.remove_results_url("WebKit Mac10.11");

        let changes = execute(&host, &target("WebKit Mac10.11", "txt"))
            .await
            .unwrap();

        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn test_port_without_specifiers() {
        let mut host = mock_host();
        host.builders = BuilderRegistry::from_entries([
            ("MOCK Win7".to_string(), BuilderInfo::new("test-win-win7", &[])),
            ("MOCK Win10".to_string(), BuilderInfo::new("test-win-win10", &[])),
        ]);
        host.write_layout_test_file(
            "platform/test-win-win10/failures/expected/image-expected.txt",
            "original win10 result",
        );
        let target = BaselineTarget {
            builder: "MOCK Win10".to_string(),
            test: "failures/expected/image.html".to_string(),
            suffixes: vec!["txt".to_string()],
            results_directory: None,
        };

        let changes = execute(&host, &target).await.unwrap();

        assert_eq!(
            host.read_layout_test_file("platform/test-win-win10/failures/expected/image-expected.txt"),
            Some(MOCK_WEB_RESULT.to_string())
        );
        assert_eq!(
            host.read_layout_test_file("platform/test-win-win7/failures/expected/image-expected.txt"),
            None
        );
        assert_eq!(
            changes.to_json_line(),
            r#"{"add": [], "remove-lines": [{"test": "failures/expected/image.html", "builder": "MOCK Win10"}], "delete": []}"#
        );
    }
}
