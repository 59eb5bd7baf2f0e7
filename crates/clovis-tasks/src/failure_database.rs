//! Accumulated task failures, keyed by reason.
//!
//! The database is serialized as a JSON object mapping each failure reason
//! to the list of details recorded for it, e.g.
//! `{"trace_collection": ["http://a.com", "http://b.com"]}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::obs;

/// The worker started with results of a previous run still present.
pub const DIRTY_STATE_ERROR: &str = "startup_with_dirty_state";

/// A task could not be run at all.
pub const CRITICAL_ERROR: &str = "critical_error";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureDatabase {
    failures: BTreeMap<String, Vec<String>>,
}

impl FailureDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Record one failure. Details keep their insertion order.
    pub fn add_failure(&mut self, reason: &str, detail: &str) {
        obs::emit_failure_recorded(reason, detail);
        self.failures
            .entry(reason.to_string())
            .or_default()
            .push(detail.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Details recorded for `reason`, empty when none.
    pub fn failures_for(&self, reason: &str) -> &[String] {
        self.failures
            .get(reason)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn reasons(&self) -> impl Iterator<Item = &str> {
        self.failures.keys().map(String::as_str)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
