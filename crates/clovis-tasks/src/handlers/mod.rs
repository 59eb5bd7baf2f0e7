//! Task handlers, one per [`crate::TaskAction`].

mod report;
mod trace;

pub use report::{ReportTaskHandler, REPORT_GENERATION_FAILURE};
pub use trace::{storage_safe_name, TraceTaskHandler, TRACE_COLLECTION_FAILURE};

use async_trait::async_trait;

use crate::error::Result;
use crate::failure_database::FailureDatabase;
use crate::task::ClovisTask;

#[async_trait]
pub trait TaskHandler: Send {
    /// Run `task`, recording per-item failures in `failures`.
    ///
    /// An `Err` means the task as a whole could not run; the dispatcher
    /// records it as a critical error.
    async fn run(&mut self, task: &ClovisTask, failures: &mut FailureDatabase) -> Result<()>;
}
