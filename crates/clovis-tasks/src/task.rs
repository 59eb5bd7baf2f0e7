//! Task descriptions exchanged between the frontend and the workers.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClovisError, Result};

/// A unit of work: an action name plus its parameters.
///
/// Tasks are stateless and run once; the dispatcher never retries them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClovisTask {
    pub action: String,

    #[serde(default = "empty_object")]
    pub action_params: serde_json::Value,

    #[serde(default = "empty_object")]
    pub backend_params: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ClovisTask {
    pub fn new(action: impl Into<String>, action_params: serde_json::Value) -> Self {
        ClovisTask {
            action: action.into(),
            action_params,
            backend_params: empty_object(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The action, if it is one this crate knows how to run.
    pub fn known_action(&self) -> Option<TaskAction> {
        self.action.parse().ok()
    }

    /// Decode `action_params` into the handler's parameter type.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.action_params.clone()).map_err(|e| {
            ClovisError::InvalidParams {
                action: self.action.clone(),
                message: e.to_string(),
            }
        })
    }
}

/// Actions understood by the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskAction {
    Trace,
    Report,
}

impl TaskAction {
    pub const ALL: [TaskAction; 2] = [TaskAction::Trace, TaskAction::Report];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskAction::Trace => "trace",
            TaskAction::Report => "report",
        }
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskAction {
    type Err = ClovisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "trace" => Ok(TaskAction::Trace),
            "report" => Ok(TaskAction::Report),
            other => Err(ClovisError::UnsupportedAction(other.to_string())),
        }
    }
}
