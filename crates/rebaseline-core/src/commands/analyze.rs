//! `analyze-baselines`: show where each baseline of some tests lives.

use crate::error::Result;
use crate::host::Host;
use crate::optimizer::{content_digest, BaselineOptimizer, GENERIC_LABEL};
use crate::port::expected_baseline_name;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyzeOptions {
    pub suffixes: Vec<String>,

    /// Also list baselines that exist nowhere.
    pub missing: bool,

    pub platform: Option<String>,
}

/// Report lines: `name:` followed by `  <directory>: <digest>` per copy.
pub fn execute(host: &Host, options: &AnalyzeOptions, test_prefixes: &[String]) -> Result<Vec<String>> {
    let optimizer = BaselineOptimizer::new(host, options.platform.as_deref());
    let mut lines = Vec::new();
    for test in host.default_port()?.tests(test_prefixes)? {
        for suffix in &options.suffixes {
            let baseline_name = expected_baseline_name(&test, suffix);
            let results = optimizer.read_results_by_directory(&baseline_name)?;
            if results.is_empty() {
                if options.missing {
                    lines.push(format!("{baseline_name}: (no baselines found)"));
                }
                continue;
            }
            lines.push(format!("{baseline_name}:"));
            for (dir, contents) in &results {
                let label = dir.as_deref().unwrap_or(GENERIC_LABEL);
                lines.push(format!("  {label}: {}", content_digest(contents)));
            }
        }
    }
    Ok(lines)
}
