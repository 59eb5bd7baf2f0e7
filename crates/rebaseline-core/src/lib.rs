//! Blink rebaseline core library
//!
//! Keeps layout-test baselines and `TestExpectations` in step with what the
//! builders actually produce: fetching `-actual` results, copying baselines
//! down the fallback chain, pruning redundant baselines, dropping stale
//! expectation lines, and landing the result.

pub mod builders;
pub mod change_set;
pub mod commands;
pub mod config;
pub mod error;
pub mod executive;
pub mod expectations;
pub mod fakes;
pub mod filesystem;
pub mod host;
pub mod obs;
pub mod optimizer;
pub mod port;
pub mod results;
pub mod scm;
pub mod telemetry;
pub mod web;

pub use builders::{BuilderInfo, BuilderRegistry};
pub use change_set::{ChangeSet, LineToRemove};
pub use config::RebaselineConfig;
pub use error::{RebaselineError, Result};
pub use executive::{CommandOutput, Executive, TokioExecutive, Watched};
pub use expectations::{
    update_expectations_files, ExpectationLine, ExpectationsFile, RemovalSummary,
    TestConfiguration,
};
pub use filesystem::{FileSystem, RealFileSystem};
pub use host::Host;
pub use optimizer::BaselineOptimizer;
pub use port::{PlatformCatalog, Port, PortSpec};
pub use results::{BuilderResultsSource, LayoutTestResults, TestResult};
pub use scm::{GitScm, Scm};
pub use telemetry::init_tracing;
pub use web::{ReqwestWeb, Web};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
