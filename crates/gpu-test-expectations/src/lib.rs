//! GPU test expectations
//!
//! Marks GPU conformance tests as failing, flaky or skipped on particular
//! configurations: OS, GPU vendor or device, ANGLE back end, build type
//! and browser. Tests not matched by any entry are expected to pass.
//!
//! ```
//! use gpu_test_expectations::{Expectation, GpuConfig, GpuTestExpectations, Os};
//!
//! let mut expectations = GpuTestExpectations::new();
//! expectations.fail("conformance/glsl/misc/*", &["win", "d3d9"], Some(1234)).unwrap();
//!
//! let config = GpuConfig::new(Os::Linux);
//! assert_eq!(
//!     expectations.expectation_for("conformance/glsl/misc/a.html", &config),
//!     Expectation::Pass
//! );
//! ```

pub mod condition;
pub mod config;
pub mod error;
pub mod expectations;
pub mod pattern;
pub mod webgl;

pub use condition::{AngleBackend, BrowserType, BuildType, Condition, ConditionSet, Os, Vendor};
pub use config::GpuConfig;
pub use error::{GpuExpectationError, Result};
pub use expectations::{Expectation, ExpectationEntry, GpuTestExpectations, DEFAULT_FLAKY_RETRIES};
pub use webgl::{WebGlConformanceExpectations, WEBGL_CONFORMANCE_EXPECTATIONS};
