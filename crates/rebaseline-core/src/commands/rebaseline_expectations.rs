//! `rebaseline-expectations`: rebaseline every test marked `Rebaseline`.

use tracing::{debug, warn};

use crate::change_set::ChangeSet;
use crate::commands::all_suffixes;
use crate::commands::parallel::{ParallelRebaseliner, RebaselineOptions, TestPrefixList};
use crate::error::Result;
use crate::host::Host;

/// Tests marked `Rebaseline` for each port with a builder, mapped to that
/// builder and every suffix.
pub fn tests_to_rebaseline(host: &Host, platform: Option<&str>) -> Result<TestPrefixList> {
    let mut list = TestPrefixList::new();
    for port in host.ports_matching(platform) {
        let Some(builder) = host.builders.builder_name_for_port_name(port.name()) else {
            debug!(port = %port.name(), "no builder for port");
            continue;
        };
        for test in port.tests_with_expectation("Rebaseline")? {
            list.entry(test)
                .or_default()
                .insert(builder.to_string(), all_suffixes());
        }
    }
    Ok(list)
}

pub async fn execute(
    host: &Host,
    options: RebaselineOptions,
    platform: Option<&str>,
) -> Result<ChangeSet> {
    let list = tests_to_rebaseline(host, platform)?;
    if list.is_empty() {
        warn!("Did not find any tests marked Rebaseline.");
        return Ok(ChangeSet::new());
    }
    ParallelRebaseliner::new(host, options).rebaseline(&list).await
}
