//! Description of the machine and browser a test runs on.

use serde::{Deserialize, Serialize};

use crate::condition::{AngleBackend, BrowserType, BuildType, Os, Vendor};
use crate::error::Result;

/// Everything an expectation can be conditioned on.
///
/// Harnesses usually hand this over as JSON, e.g.
/// `{"os": "win7", "vendor": "amd", "device_id": 26489, "angle": "d3d9"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuConfig {
    pub os: Os,
    #[serde(default)]
    pub vendor: Option<Vendor>,
    #[serde(default)]
    pub device_id: Option<u32>,
    #[serde(default)]
    pub device_string: Option<String>,
    #[serde(default)]
    pub angle: AngleBackend,
    #[serde(default)]
    pub build: BuildType,
    #[serde(default)]
    pub browser: Option<BrowserType>,
}

impl GpuConfig {
    /// A release build on `os` with no GPU details.
    pub fn new(os: Os) -> Self {
        GpuConfig {
            os,
            vendor: None,
            device_id: None,
            device_string: None,
            angle: AngleBackend::NoAngle,
            build: BuildType::Release,
            browser: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_gpu(mut self, vendor: Vendor, device_id: u32) -> Self {
        self.vendor = Some(vendor);
        self.device_id = Some(device_id);
        self
    }

    pub fn with_device_string(mut self, vendor: Vendor, device: &str) -> Self {
        self.vendor = Some(vendor);
        self.device_string = Some(device.to_string());
        self
    }

    pub fn with_angle(mut self, angle: AngleBackend) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_build(mut self, build: BuildType) -> Self {
        self.build = build;
        self
    }

    pub fn with_browser(mut self, browser: BrowserType) -> Self {
        self.browser = Some(browser);
        self
    }
}
