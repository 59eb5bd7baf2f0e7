//! `rebaseline`: rebaseline test prefixes against a set of builders.

use tracing::info;

use crate::change_set::ChangeSet;
use crate::commands::parallel::{ParallelRebaseliner, RebaselineOptions, TestPrefixList};
use crate::error::Result;
use crate::host::Host;

/// Map every prefix to every builder with the same suffixes. No builders
/// means all release builders.
pub fn test_prefix_list(
    host: &Host,
    builders: &[String],
    suffixes: &[String],
    test_prefixes: &[String],
) -> Result<TestPrefixList> {
    let builders = if builders.is_empty() {
        host.builders.release_builders()
    } else {
        for builder in builders {
            host.builders.info(builder)?;
        }
        builders.to_vec()
    };
    Ok(test_prefixes
        .iter()
        .map(|prefix| {
            let per_builder = builders
                .iter()
                .map(|builder| (builder.clone(), suffixes.to_vec()))
                .collect();
            (prefix.clone(), per_builder)
        })
        .collect())
}

pub async fn execute(
    host: &Host,
    options: RebaselineOptions,
    builders: &[String],
    suffixes: &[String],
    test_prefixes: &[String],
) -> Result<ChangeSet> {
    let list = test_prefix_list(host, builders, suffixes, test_prefixes)?;
    info!(prefixes = list.len(), "rebaselining requested tests");
    ParallelRebaseliner::new(host, options).rebaseline(&list).await
}
