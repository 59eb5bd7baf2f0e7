//! `copy-existing-baselines-internal`.
//!
//! Before a builder's baseline directory gets new results, ports that fall
//! back to that directory right after their own get a copy of the baseline
//! they currently see, so overwriting it does not change their results.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::change_set::ChangeSet;
use crate::commands::{baseline_directory_name, BaselineTarget};
use crate::error::Result;
use crate::host::Host;
use crate::port::{expected_baseline_name, Port};

pub fn execute(host: &Host, target: &BaselineTarget) -> Result<ChangeSet> {
    let mut changes = ChangeSet::new();
    let copies = planned_copies(host, target)?;
    for (source, destination) in copies {
        debug!(
            from = %source.display(),
            to = %destination.display(),
            "copying existing baseline"
        );
        host.filesystem.copy_file(&source, &destination)?;
        if !host.scm.exists(&destination) {
            changes.add_file(&destination);
        }
    }
    Ok(changes)
}

/// `(source, destination)` pairs, gathered before anything is copied.
fn planned_copies(host: &Host, target: &BaselineTarget) -> Result<Vec<(PathBuf, PathBuf)>> {
    let port = host.port_for_builder(&target.builder)?;
    let baseline_dir = baseline_directory_name(host, &target.builder)?;
    let predecessors = host.catalog.immediate_predecessors_in_fallback(&baseline_dir);

    let mut copies = Vec::new();
    for suffix in &target.suffixes {
        let source = port.expected_filename(&target.test, suffix);
        if !host.filesystem.exists(&source) {
            debug!(test = %target.test, suffix = %suffix, "no existing baseline to copy");
            continue;
        }
        for platform_dir in &predecessors {
            let spec = match host.catalog.port_for_primary_baseline(platform_dir) {
                Ok(spec) => spec,
                Err(err) => {
                    warn!(error = %err, "skipping fallback directory");
                    continue;
                }
            };
            let predecessor = Port::new(host, spec);
            let destination = predecessor
                .baseline_version_dir()
                .join(expected_baseline_name(&target.test, suffix));
            if host.filesystem.exists(&destination) {
                debug!(
                    path = %destination.display(),
                    "baseline already present, not copying over it"
                );
                continue;
            }
            if predecessor.is_skipped_by_expectations(&target.test)?
                || predecessor.skips_test(&target.test)?
            {
                debug!(
                    test = %target.test,
                    port = %predecessor.name(),
                    "test is skipped, not copying"
                );
                continue;
            }
            copies.push((source.clone(), destination));
        }
    }
    Ok(copies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{BuilderInfo, BuilderRegistry};
    use crate::fakes::mock_host;

    const IMAGE_TEST: &str = "failures/expected/image.html";

    fn target(builder: &str) -> BaselineTarget {
        BaselineTarget {
            builder: builder.to_string(),
            test: IMAGE_TEST.to_string(),
            suffixes: vec!["txt".to_string()],
            results_directory: None,
        }
    }

    fn registry(names: &[(&str, &str)]) -> BuilderRegistry {
        BuilderRegistry::from_entries(names.iter().map(|(name, port)| {
            (name.to_string(), BuilderInfo::new(port, &["mock-specifier"]))
        }))
    }

    #[test]
    fn test_copies_to_each_port_falling_back_to_the_builder() {
        let mut host = mock_host();
        host.builders = registry(&[
            ("MOCK Mac10.10", "test-mac-mac10.10"),
            ("MOCK Trusty", "test-linux-trusty"),
            ("MOCK Precise", "test-linux-precise"),
            ("MOCK Win7", "test-win-win7"),
        ]);
        host.write_layout_test_file(
            "platform/test-win-win7/failures/expected/image-expected.txt",
            "original win7 result",
        );

        let changes = execute(&host, &target("MOCK Win7")).unwrap();

        assert_eq!(
            host.read_layout_test_file("platform/test-linux-trusty/failures/expected/image-expected.txt"),
            Some("original win7 result".to_string())
        );
        assert_eq!(
            host.read_layout_test_file("platform/test-linux-precise/failures/expected/image-expected.txt"),
            None
        );
        assert!(changes.is_empty());
    }

    #[test]
    fn test_existing_copy_is_not_overwritten() {
        let host = mock_host();
        host.write_layout_test_file(
            "platform/test-mac-mac10.11/failures/expected/image-expected.txt",
            "mac10.11 result",
        );
        host.write_layout_test_file(
            "platform/test-mac-mac10.10/failures/expected/image-expected.txt",
            "original mac10.10 result",
        );

        execute(&host, &target("MOCK Mac10.11")).unwrap();

        assert_eq!(
            host.read_layout_test_file("platform/test-mac-mac10.10/failures/expected/image-expected.txt"),
            Some("original mac10.10 result".to_string())
        );
    }

    #[test]
    fn test_skipped_test_is_not_copied() {
        let host = mock_host();
        host.write_layout_test_file(
            "platform/test-win-win7/failures/expected/image-expected.txt",
            "original win7 result",
        );
        host.write_layout_test_file(
            "TestExpectations",
            "[ Win ] failures/expected/image.html [ Failure ]\n[ Linux ] failures/expected/image.html [ Skip ]\n",
        );

        execute(&host, &target("MOCK Win7")).unwrap();

        assert_eq!(
            host.read_layout_test_file("platform/test-linux-trusty/failures/expected/image-expected.txt"),
            None
        );
        assert_eq!(
            host.read_layout_test_file("platform/test-win-win7/failures/expected/image-expected.txt"),
            Some("original win7 result".to_string())
        );
    }

    #[test]
    fn test_untracked_copies_are_reported() {
        let host = mock_host();
        host.scm.track_only_listed();
        host.write_layout_test_file(
            "platform/test-win-win7/failures/expected/image-expected.txt",
            "original win7 result",
        );

        let changes = execute(&host, &target("MOCK Win7")).unwrap();

        assert_eq!(
            changes.add,
            vec!["/mock-checkout/third_party/WebKit/LayoutTests/platform/test-linux-trusty/failures/expected/image-expected.txt"]
        );
    }
}
