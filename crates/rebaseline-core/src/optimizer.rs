//! Baseline de-duplication along the platform hierarchy.
//!
//! A platform copy of a baseline that is byte-identical to what the port
//! would fall back to without it is redundant and gets deleted. When no
//! generic baseline exists but every port resolves to the same content,
//! that content moves to the generic location.

use std::collections::BTreeMap;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::change_set::ChangeSet;
use crate::error::Result;
use crate::host::Host;

/// Label used for the generic `LayoutTests/` directory.
pub const GENERIC_LABEL: &str = "(generic)";

/// Baseline contents keyed by platform directory; `None` is the generic one.
pub type ResultsByDirectory = BTreeMap<Option<String>, Vec<u8>>;

/// Short hex digest identifying baseline contents in reports.
pub fn content_digest(contents: &[u8]) -> String {
    let hash = Sha256::digest(contents);
    hex::encode(hash)[..6].to_string()
}

/// Planned changes for one baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationPlan {
    pub delete: Vec<PathBuf>,
    /// New generic baseline and its contents.
    pub promote: Option<(PathBuf, Vec<u8>)>,
}

impl OptimizationPlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.promote.is_none()
    }
}

pub struct BaselineOptimizer<'a> {
    host: &'a Host,
    port_filter: Option<String>,
}

impl<'a> BaselineOptimizer<'a> {
    /// Optimizer touching only the directories of ports whose name starts
    /// with `port_filter` (every port without one).
    pub fn new(host: &'a Host, port_filter: Option<&str>) -> Self {
        BaselineOptimizer {
            host,
            port_filter: port_filter.map(str::to_string),
        }
    }

    fn directory(&self, dir: Option<&str>) -> PathBuf {
        let layout_tests = self.host.layout_tests_dir();
        match dir {
            Some(dir) => layout_tests.join("platform").join(dir),
            None => layout_tests,
        }
    }

    fn baseline_path(&self, dir: Option<&str>, baseline_name: &str) -> PathBuf {
        self.directory(dir).join(baseline_name)
    }

    /// Platform directories of the filtered ports.
    fn candidate_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = Vec::new();
        for port in self.host.ports_matching(self.port_filter.as_deref()) {
            for dir in &port.spec().baseline_search_path {
                if !dirs.contains(dir) {
                    dirs.push(dir.clone());
                }
            }
        }
        dirs
    }

    fn read_dirs(&self, dirs: &[String], baseline_name: &str) -> Result<ResultsByDirectory> {
        let fs = &self.host.filesystem;
        let mut results = ResultsByDirectory::new();
        let generic = self.baseline_path(None, baseline_name);
        if fs.exists(&generic) {
            results.insert(None, fs.read_binary(&generic)?);
        }
        for dir in dirs {
            let path = self.baseline_path(Some(dir), baseline_name);
            if fs.exists(&path) {
                results.insert(Some(dir.clone()), fs.read_binary(&path)?);
            }
        }
        Ok(results)
    }

    /// Copies of `baseline_name` (layout-tests-relative) in the generic
    /// directory and the directories of the filtered ports.
    pub fn read_results_by_directory(&self, baseline_name: &str) -> Result<ResultsByDirectory> {
        self.read_dirs(&self.candidate_dirs(), baseline_name)
    }

    /// What each port of the catalog resolves `baseline_name` to.
    fn resolutions<'r>(&self, results: &'r ResultsByDirectory) -> Vec<Option<&'r [u8]>> {
        self.host
            .catalog
            .ports
            .iter()
            .map(|port| {
                port.baseline_search_path
                    .iter()
                    .find_map(|dir| results.get(&Some(dir.clone())))
                    .or_else(|| results.get(&None))
                    .map(Vec::as_slice)
            })
            .collect()
    }

    fn depth(&self, dir: &str) -> usize {
        let limit = self.host.catalog.platform_dirs().len();
        let mut depth = 0;
        let mut current = Some(dir);
        while let Some(d) = current {
            if depth > limit {
                break;
            }
            depth += 1;
            current = self.host.catalog.parent_of(d);
        }
        depth
    }

    /// Content `dir` falls back to: nearest ancestor holding a copy, else
    /// the generic baseline.
    fn ancestor_content<'r>(&self, dir: &str, results: &'r ResultsByDirectory) -> Option<&'r Vec<u8>> {
        let limit = self.host.catalog.platform_dirs().len();
        let mut current = self.host.catalog.parent_of(dir);
        let mut steps = 0;
        while let Some(parent) = current {
            if let Some(contents) = results.get(&Some(parent.to_string())) {
                return Some(contents);
            }
            steps += 1;
            if steps > limit {
                break;
            }
            current = self.host.catalog.parent_of(parent);
        }
        results.get(&None)
    }

    fn resolutions_unchanged(&self, before: &ResultsByDirectory, after: &ResultsByDirectory) -> bool {
        self.resolutions(before) == self.resolutions(after)
    }

    /// Work out the deletions (and a possible promotion) for one baseline.
    pub fn plan(&self, baseline_name: &str) -> Result<OptimizationPlan> {
        let all_dirs = self.host.catalog.platform_dirs();
        let original = self.read_dirs(&all_dirs, baseline_name)?;
        let mut current = original.clone();

        let mut candidates: Vec<String> = self
            .candidate_dirs()
            .into_iter()
            .filter(|dir| current.contains_key(&Some(dir.clone())))
            .collect();
        candidates.sort_by_key(|dir| (self.depth(dir), dir.clone()));

        let mut plan = OptimizationPlan::default();
        for dir in &candidates {
            let key = Some(dir.clone());
            let redundant = match (current.get(&key), self.ancestor_content(dir, &current)) {
                (Some(own), Some(ancestor)) => own == ancestor,
                _ => false,
            };
            if !redundant {
                continue;
            }
            let mut without = current.clone();
            without.remove(&key);
            if self.resolutions_unchanged(&original, &without) {
                debug!(baseline = %baseline_name, dir = %dir, "redundant copy");
                current = without;
                plan.delete.push(self.baseline_path(Some(dir), baseline_name));
            }
        }

        if !current.contains_key(&None) {
            self.plan_promotion(baseline_name, &original, current, &candidates, &mut plan);
        }
        Ok(plan)
    }

    fn plan_promotion(
        &self,
        baseline_name: &str,
        original: &ResultsByDirectory,
        mut current: ResultsByDirectory,
        candidates: &[String],
        plan: &mut OptimizationPlan,
    ) {
        let resolved = self.resolutions(&current);
        let Some(Some(shared)) = resolved.first().copied() else {
            return;
        };
        if !resolved.iter().all(|r| *r == Some(shared)) {
            return;
        }
        let shared = shared.to_vec();
        current.insert(None, shared.clone());

        let mut deleted = Vec::new();
        for dir in candidates {
            let key = Some(dir.clone());
            if current.get(&key) != Some(&shared) {
                continue;
            }
            let mut without = current.clone();
            without.remove(&key);
            if self.resolutions_unchanged(original, &without) {
                current = without;
                deleted.push(self.baseline_path(Some(dir), baseline_name));
            }
        }
        if deleted.is_empty() {
            return;
        }
        debug!(baseline = %baseline_name, "promoting to generic");
        plan.delete.extend(deleted);
        plan.promote = Some((self.baseline_path(None, baseline_name), shared));
    }

    /// Optimize one baseline. With `modify_scm` the changes go through
    /// source control and the returned change set is empty; otherwise the
    /// files are changed directly and reported.
    pub fn optimize(&self, baseline_name: &str, modify_scm: bool) -> Result<ChangeSet> {
        let plan = self.plan(baseline_name)?;
        let mut changes = ChangeSet::new();
        if plan.is_empty() {
            debug!(baseline = %baseline_name, "nothing to optimize");
            return Ok(changes);
        }
        info!(
            baseline = %baseline_name,
            deleted = plan.delete.len(),
            promoted = plan.promote.is_some(),
            "optimizing baseline"
        );

        let fs = &self.host.filesystem;
        if let Some((path, contents)) = &plan.promote {
            fs.write_binary(path, contents)?;
        }
        if modify_scm {
            if let Some((path, _)) = &plan.promote {
                self.host.scm.add_list(std::slice::from_ref(path))?;
            }
            self.host.scm.delete_list(&plan.delete)?;
            return Ok(changes);
        }

        for path in &plan.delete {
            fs.remove(path)?;
            changes.delete_file(path);
        }
        if let Some((path, _)) = &plan.promote {
            changes.add_file(path);
        }
        Ok(changes)
    }
}
