//! Clovis cloud task dispatch.
//!
//! Workers receive [`ClovisTask`]s and route them through a [`Dispatcher`]
//! to the handler for their [`TaskAction`]:
//!
//! - `trace` collects loading traces for a list of URLs and uploads them
//!   with their logs ([`TraceTaskHandler`]).
//! - `report` turns collected traces into report rows ([`ReportTaskHandler`]).
//!
//! Failures never propagate out of the dispatcher; they accumulate in a
//! [`FailureDatabase`] that the worker uploads when it is done.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod failure_database;
pub mod fakes;
pub mod handlers;
pub mod obs;
pub mod report;
pub mod storage;
pub mod task;
pub mod trace_database;
pub mod trace_generator;

pub use config::ClovisConfig;
pub use dispatcher::Dispatcher;
pub use error::{ClovisError, Result};
pub use failure_database::{FailureDatabase, CRITICAL_ERROR, DIRTY_STATE_ERROR};
pub use handlers::{ReportTaskHandler, TaskHandler, TraceTaskHandler};
pub use report::{JsonLinesReportSink, ReportRow, ReportSink};
pub use storage::{DirectoryStorage, Storage};
pub use task::{ClovisTask, TaskAction};
pub use trace_database::TraceDatabase;
pub use trace_generator::{CommandTraceGenerator, TraceGenerator, TraceMetadata, TraceRequest};
