//! Drops expectations that a rebaseline made obsolete.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::Result;
use crate::expectations::{BuildType, ExpectationsFile, RemovalSummary, TestConfiguration};
use crate::host::Host;
use crate::obs;

/// For every `test → builders` entry, remove the configurations of those
/// builders (and of every port that never runs the test) from the generic
/// expectations file, then write it back.
pub fn update_expectations_files(
    host: &Host,
    lines_to_remove: &BTreeMap<String, Vec<String>>,
) -> Result<RemovalSummary> {
    let path = host.path_to_generic_test_expectations_file();
    if !host.filesystem.exists(&path) {
        warn!(path = %path.display(), "no expectations file to update");
        return Ok(RemovalSummary::default());
    }

    let converter = host.converter();
    let mut file = ExpectationsFile::parse(&host.filesystem.read_text(&path)?, &converter);
    let mut total = RemovalSummary::default();

    for (test, builders) in lines_to_remove {
        let mut configurations = BTreeSet::new();
        for builder in builders {
            let port = host.port_for_builder(builder)?;
            configurations.extend(all_build_types(port.version()));
        }
        for port in host.ports() {
            if port.skips_test(test)? {
                configurations.extend(all_build_types(port.version()));
            }
        }
        debug!(test = %test, configurations = configurations.len(), "removing configurations");

        let summary = file.remove_configurations(test, &configurations);
        total.modified += summary.modified;
        total.removed += summary.removed;
    }

    host.filesystem
        .write_text(&path, &file.to_text(&converter))?;
    obs::emit_expectations_updated(&path.display().to_string(), total.modified, total.removed);
    Ok(total)
}

fn all_build_types(version: &str) -> impl Iterator<Item = TestConfiguration> + '_ {
    BuildType::ALL
        .into_iter()
        .map(move |build_type| TestConfiguration::new(version, build_type))
}
