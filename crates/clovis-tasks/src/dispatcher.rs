//! Routes tasks to the handler registered for their action.

use std::collections::BTreeMap;

use tracing::{error, Instrument};

use crate::failure_database::{FailureDatabase, CRITICAL_ERROR};
use crate::handlers::TaskHandler;
use crate::obs;
use crate::task::{ClovisTask, TaskAction};

/// Owns the handlers and the failure database they share.
///
/// Dispatch never fails: an unknown action, an action without a handler,
/// or a handler error becomes a [`CRITICAL_ERROR`] record whose detail is
/// the task's action. Tasks are not retried.
#[derive(Default)]
pub struct Dispatcher {
    handlers: BTreeMap<TaskAction, Box<dyn TaskHandler>>,
    failures: FailureDatabase,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, action: TaskAction, handler: impl TaskHandler + 'static) -> Self {
        self.register(action, handler);
        self
    }

    /// Install `handler` for `action`, replacing any previous one.
    pub fn register(&mut self, action: TaskAction, handler: impl TaskHandler + 'static) {
        self.handlers.insert(action, Box::new(handler));
    }

    pub fn supports(&self, action: TaskAction) -> bool {
        self.handlers.contains_key(&action)
    }

    pub async fn dispatch(&mut self, task: &ClovisTask) {
        let failures = &mut self.failures;
        let Some(handler) = task
            .known_action()
            .and_then(|action| self.handlers.get_mut(&action))
        else {
            error!(action = %task.action, "unsupported task action");
            failures.add_failure(CRITICAL_ERROR, &task.action);
            return;
        };

        obs::emit_task_dispatched(&task.action);
        let result = handler
            .run(task, failures)
            .instrument(obs::task_span(&task.action))
            .await;
        if let Err(e) = result {
            error!(action = %task.action, error = %e, "task failed");
            failures.add_failure(CRITICAL_ERROR, &task.action);
        }
    }

    /// Record a task file that could not be read or parsed.
    pub fn record_unreadable_task(&mut self, source: &str) {
        self.failures.add_failure(CRITICAL_ERROR, source);
    }

    pub fn failures(&self) -> &FailureDatabase {
        &self.failures
    }

    pub fn into_failures(self) -> FailureDatabase {
        self.failures
    }
}
