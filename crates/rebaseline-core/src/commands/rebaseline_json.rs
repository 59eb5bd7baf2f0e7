//! `rebaseline-json`: rebaseline from a `{test: {builder: [suffix]}}` document.

use crate::change_set::ChangeSet;
use crate::commands::parallel::{ParallelRebaseliner, RebaselineOptions, TestPrefixList};
use crate::error::Result;
use crate::host::Host;

pub fn parse_test_prefix_list(json: &str) -> Result<TestPrefixList> {
    Ok(serde_json::from_str(json)?)
}

pub async fn execute(host: &Host, options: RebaselineOptions, json: &str) -> Result<ChangeSet> {
    let test_prefix_list = parse_test_prefix_list(json)?;
    ParallelRebaseliner::new(host, options)
        .rebaseline(&test_prefix_list)
        .await
}
