//! Ordered list of conditional test expectations.

use tracing::debug;

use crate::condition::ConditionSet;
use crate::config::GpuConfig;
use crate::error::{GpuExpectationError, Result};
use crate::pattern::wildcard_match;

/// Retries granted to a flaky test unless the entry says otherwise.
pub const DEFAULT_FLAKY_RETRIES: u32 = 2;

/// What a test is expected to do on a given configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    Pass,
    Fail,
    Flaky { max_retries: u32 },
    Skip,
}

impl Expectation {
    pub fn as_str(self) -> &'static str {
        match self {
            Expectation::Pass => "pass",
            Expectation::Fail => "fail",
            Expectation::Flaky { .. } => "flaky",
            Expectation::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationEntry {
    pub pattern: String,
    pub conditions: ConditionSet,
    pub bug: Option<u32>,
    pub expectation: Expectation,
}

impl ExpectationEntry {
    pub fn applies_to(&self, test: &str, config: &GpuConfig) -> bool {
        wildcard_match(&self.pattern, test) && self.conditions.matches(config)
    }
}

/// Expectations in the order they were added. When several entries match a
/// test, the one added last wins.
#[derive(Debug, Clone, Default)]
pub struct GpuTestExpectations {
    entries: Vec<ExpectationEntry>,
}

impl GpuTestExpectations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, pattern: &str, conditions: &[&str], bug: Option<u32>) -> Result<()> {
        self.add(pattern, conditions, bug, Expectation::Fail)
    }

    pub fn flaky(
        &mut self,
        pattern: &str,
        conditions: &[&str],
        bug: Option<u32>,
        max_retries: u32,
    ) -> Result<()> {
        self.add(pattern, conditions, bug, Expectation::Flaky { max_retries })
    }

    pub fn skip(&mut self, pattern: &str, conditions: &[&str], bug: Option<u32>) -> Result<()> {
        self.add(pattern, conditions, bug, Expectation::Skip)
    }

    fn add(
        &mut self,
        pattern: &str,
        conditions: &[&str],
        bug: Option<u32>,
        expectation: Expectation,
    ) -> Result<()> {
        if pattern.trim().is_empty() {
            return Err(GpuExpectationError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "empty pattern".to_string(),
            });
        }
        let conditions = ConditionSet::parse(conditions)?;
        self.entries.push(ExpectationEntry {
            pattern: pattern.to_string(),
            conditions,
            bug,
            expectation,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[ExpectationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry deciding `test` on `config`, if any.
    pub fn entry_for(&self, test: &str, config: &GpuConfig) -> Option<&ExpectationEntry> {
        self.entries.iter().rev().find(|e| e.applies_to(test, config))
    }

    pub fn expectation_for(&self, test: &str, config: &GpuConfig) -> Expectation {
        match self.entry_for(test, config) {
            Some(entry) => {
                debug!(
                    test = %test,
                    pattern = %entry.pattern,
                    expectation = entry.expectation.as_str(),
                    bug = ?entry.bug,
                    "expectation matched"
                );
                entry.expectation
            }
            None => Expectation::Pass,
        }
    }

    /// Retries allowed for `test`; zero unless it is expected to be flaky.
    pub fn max_retries_for(&self, test: &str, config: &GpuConfig) -> u32 {
        match self.expectation_for(test, config) {
            Expectation::Flaky { max_retries } => max_retries,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{AngleBackend, BuildType, Os, Vendor};

    fn win_amd() -> GpuConfig {
        GpuConfig::new(Os::Win7)
            .with_gpu(Vendor::Amd, 0x6779)
            .with_angle(AngleBackend::D3d9)
    }

    #[test]
    fn test_unconditional_entry_applies_everywhere() {
        let mut e = GpuTestExpectations::new();
        e.fail("deqp/data/gles2/shaders/functions.html", &[], Some(478572)).unwrap();

        for os in [Os::Win10, Os::Linux, Os::Android] {
            assert_eq!(
                e.expectation_for("deqp/data/gles2/shaders/functions.html", &GpuConfig::new(os)),
                Expectation::Fail
            );
        }
        assert_eq!(
            e.expectation_for("deqp/data/gles2/shaders/other.html", &GpuConfig::new(Os::Linux)),
            Expectation::Pass
        );
    }

    #[test]
    fn test_every_category_must_match() {
        let mut e = GpuTestExpectations::new();
        e.fail("a.html", &["win", "amd", "d3d9"], None).unwrap();

        assert_eq!(e.expectation_for("a.html", &win_amd()), Expectation::Fail);
        assert_eq!(
            e.expectation_for("a.html", &win_amd().with_angle(AngleBackend::D3d11)),
            Expectation::Pass
        );
        assert_eq!(
            e.expectation_for("a.html", &GpuConfig::new(Os::Win7).with_angle(AngleBackend::D3d9)),
            Expectation::Pass
        );
    }

    #[test]
    fn test_any_entry_in_a_category_matches() {
        let mut e = GpuTestExpectations::new();
        e.fail("a.html", &["mac", "nvidia:0xfd5", "nvidia:0xfe9"], None).unwrap();

        let mac = |device| GpuConfig::new(Os::Yosemite).with_gpu(Vendor::Nvidia, device);
        assert_eq!(e.expectation_for("a.html", &mac(0xfd5)), Expectation::Fail);
        assert_eq!(e.expectation_for("a.html", &mac(0xfe9)), Expectation::Fail);
        assert_eq!(e.expectation_for("a.html", &mac(0x123)), Expectation::Pass);
    }

    #[test]
    fn test_device_strings_and_build_types() {
        let mut e = GpuTestExpectations::new();
        e.skip("b.html", &["android", "qualcomm:Adreno (TM) 420"], None).unwrap();
        e.skip("c.html", &["linux", "debug", "intel:0x412"], None).unwrap();

        let nexus6 = GpuConfig::new(Os::Android).with_device_string(Vendor::Qualcomm, "Adreno (TM) 420");
        let nexus5 = GpuConfig::new(Os::Android).with_device_string(Vendor::Qualcomm, "Adreno (TM) 330");
        assert_eq!(e.expectation_for("b.html", &nexus6), Expectation::Skip);
        assert_eq!(e.expectation_for("b.html", &nexus5), Expectation::Pass);

        let linux = GpuConfig::new(Os::Linux).with_gpu(Vendor::Intel, 0x412);
        assert_eq!(e.expectation_for("c.html", &linux), Expectation::Pass);
        assert_eq!(
            e.expectation_for("c.html", &linux.with_build(BuildType::Debug)),
            Expectation::Skip
        );
    }

    #[test]
    fn test_last_matching_entry_wins() {
        let mut e = GpuTestExpectations::new();
        e.flaky("conformance/*", &["win", "amd:0x6779"], Some(491419), DEFAULT_FLAKY_RETRIES)
            .unwrap();
        e.fail("conformance/extensions/angle-instanced-arrays.html", &["win", "amd", "d3d9"], Some(475095))
            .unwrap();

        let config = win_amd();
        assert_eq!(
            e.expectation_for("conformance/extensions/angle-instanced-arrays.html", &config),
            Expectation::Fail
        );
        assert_eq!(
            e.entry_for("conformance/extensions/angle-instanced-arrays.html", &config)
                .unwrap()
                .bug,
            Some(475095)
        );
        assert_eq!(e.max_retries_for("conformance/rendering/point-size.html", &config), 2);
        assert_eq!(
            e.max_retries_for("conformance/extensions/angle-instanced-arrays.html", &config),
            0
        );
    }

    #[test]
    fn test_bad_entries_are_rejected() {
        let mut e = GpuTestExpectations::new();
        assert!(e.fail("a.html", &["windows"], None).is_err());
        assert!(e.fail("  ", &[], None).is_err());
        assert!(e.is_empty());
    }
}
