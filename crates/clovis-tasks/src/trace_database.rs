//! Index of the traces a worker has collected: cloud location to metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceDatabase {
    traces: BTreeMap<String, serde_json::Value>,
}

impl TraceDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn set_trace(&mut self, location: &str, metadata: serde_json::Value) {
        self.traces.insert(location.to_string(), metadata);
    }

    pub fn get(&self, location: &str) -> Option<&serde_json::Value> {
        self.traces.get(location)
    }

    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.traces.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
