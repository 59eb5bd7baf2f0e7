//! Conditions restricting where an expectation applies.
//!
//! Conditions are written as short names (`win`, `nvidia`, `d3d9`,
//! `debug`, `android-webview-shell`, ...). A specific GPU is written as
//! `vendor:device`, where the device is a hex PCI id (`amd:0x6779`) or the
//! device string reported by the driver (`qualcomm:Adreno (TM) 420`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::GpuConfig;
use crate::error::{GpuExpectationError, Result};

/// Operating system version the tests run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Xp,
    Vista,
    Win7,
    Win8,
    Win10,
    Leopard,
    SnowLeopard,
    Lion,
    MountainLion,
    Mavericks,
    Yosemite,
    ElCapitan,
    Linux,
    ChromeOs,
    Android,
}

impl Os {
    pub fn is_win(self) -> bool {
        matches!(self, Os::Xp | Os::Vista | Os::Win7 | Os::Win8 | Os::Win10)
    }

    pub fn is_mac(self) -> bool {
        matches!(
            self,
            Os::Leopard
                | Os::SnowLeopard
                | Os::Lion
                | Os::MountainLion
                | Os::Mavericks
                | Os::Yosemite
                | Os::ElCapitan
        )
    }

    fn from_name(name: &str) -> Option<Os> {
        Some(match name {
            "xp" => Os::Xp,
            "vista" => Os::Vista,
            "win7" => Os::Win7,
            "win8" => Os::Win8,
            "win10" => Os::Win10,
            "leopard" => Os::Leopard,
            "snowleopard" => Os::SnowLeopard,
            "lion" => Os::Lion,
            "mountainlion" => Os::MountainLion,
            "mavericks" => Os::Mavericks,
            "yosemite" => Os::Yosemite,
            "elcapitan" => Os::ElCapitan,
            "linux" => Os::Linux,
            "chromeos" => Os::ChromeOs,
            "android" => Os::Android,
            _ => return None,
        })
    }
}

/// An OS condition: a whole family or one version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsCondition {
    Win,
    Mac,
    Exact(Os),
}

impl OsCondition {
    pub fn matches(self, os: Os) -> bool {
        match self {
            OsCondition::Win => os.is_win(),
            OsCondition::Mac => os.is_mac(),
            OsCondition::Exact(wanted) => wanted == os,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Nvidia,
    Amd,
    Intel,
    Qualcomm,
}

impl Vendor {
    /// PCI vendor id.
    pub fn id(self) -> u32 {
        match self {
            Vendor::Nvidia => 0x10de,
            Vendor::Amd => 0x1002,
            Vendor::Intel => 0x8086,
            Vendor::Qualcomm => 0x5143,
        }
    }

    pub fn from_id(id: u32) -> Option<Vendor> {
        [Vendor::Nvidia, Vendor::Amd, Vendor::Intel, Vendor::Qualcomm]
            .into_iter()
            .find(|v| v.id() == id)
    }

    fn from_name(name: &str) -> Option<Vendor> {
        match name {
            "nvidia" => Some(Vendor::Nvidia),
            "amd" => Some(Vendor::Amd),
            "intel" => Some(Vendor::Intel),
            "qualcomm" => Some(Vendor::Qualcomm),
            _ => None,
        }
    }
}

/// Graphics back end behind ANGLE, or `NoAngle` for native GL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleBackend {
    D3d9,
    D3d11,
    Opengl,
    #[default]
    NoAngle,
}

impl AngleBackend {
    /// Back end named by a `GL_RENDERER` string.
    pub fn from_gl_renderer(renderer: &str) -> AngleBackend {
        if renderer.contains("Direct3D11") {
            AngleBackend::D3d11
        } else if renderer.contains("Direct3D9") {
            AngleBackend::D3d9
        } else if renderer.contains("OpenGL") {
            AngleBackend::Opengl
        } else {
            AngleBackend::NoAngle
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    #[default]
    Release,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrowserType {
    AndroidContentShell,
    AndroidWebviewShell,
    AndroidChromium,
}

impl BrowserType {
    fn from_name(name: &str) -> Option<BrowserType> {
        match name {
            "android-content-shell" => Some(BrowserType::AndroidContentShell),
            "android-webview-shell" => Some(BrowserType::AndroidWebviewShell),
            "android-chromium" => Some(BrowserType::AndroidChromium),
            _ => None,
        }
    }
}

/// Device half of a `vendor:device` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMatch {
    Id(u32),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Os(OsCondition),
    Vendor(Vendor),
    Device(Vendor, DeviceMatch),
    Angle(AngleBackend),
    Build(BuildType),
    Browser(BrowserType),
}

fn parse_device(text: &str, vendor: &str, device: &str) -> Result<Condition> {
    let invalid = |reason: &str| GpuExpectationError::InvalidDevice {
        condition: text.to_string(),
        reason: reason.to_string(),
    };
    let vendor = Vendor::from_name(vendor).ok_or_else(|| invalid("unknown vendor"))?;
    let device = device.trim();
    if device.is_empty() {
        return Err(invalid("empty device"));
    }
    let matcher = match device.strip_prefix("0x") {
        Some(hex) => DeviceMatch::Id(u32::from_str_radix(hex, 16).map_err(|_| invalid("bad device id"))?),
        None => DeviceMatch::Name(device.to_string()),
    };
    Ok(Condition::Device(vendor, matcher))
}

impl FromStr for Condition {
    type Err = GpuExpectationError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some((vendor, device)) = s.split_once(':') {
            return parse_device(s, vendor, device);
        }
        let name = s.trim().to_ascii_lowercase();
        let condition = match name.as_str() {
            "win" => Condition::Os(OsCondition::Win),
            "mac" => Condition::Os(OsCondition::Mac),
            "d3d9" => Condition::Angle(AngleBackend::D3d9),
            "d3d11" => Condition::Angle(AngleBackend::D3d11),
            "opengl" => Condition::Angle(AngleBackend::Opengl),
            "no_angle" => Condition::Angle(AngleBackend::NoAngle),
            "release" => Condition::Build(BuildType::Release),
            "debug" => Condition::Build(BuildType::Debug),
            other => {
                if let Some(os) = Os::from_name(other) {
                    Condition::Os(OsCondition::Exact(os))
                } else if let Some(vendor) = Vendor::from_name(other) {
                    Condition::Vendor(vendor)
                } else if let Some(browser) = BrowserType::from_name(other) {
                    Condition::Browser(browser)
                } else {
                    return Err(GpuExpectationError::UnknownCondition(s.to_string()));
                }
            }
        };
        Ok(condition)
    }
}

impl fmt::Display for DeviceMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMatch::Id(id) => write!(f, "{id:#x}"),
            DeviceMatch::Name(name) => f.write_str(name),
        }
    }
}

/// Conditions of one expectation, grouped by category.
///
/// Each category matches when it is empty or when any of its entries
/// matches; the set matches when every category does.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSet {
    pub os: Vec<OsCondition>,
    pub vendors: Vec<Vendor>,
    pub devices: Vec<(Vendor, DeviceMatch)>,
    pub angle: Vec<AngleBackend>,
    pub build: Vec<BuildType>,
    pub browser: Vec<BrowserType>,
}

fn any_or_empty<T>(items: &[T], pred: impl Fn(&T) -> bool) -> bool {
    items.is_empty() || items.iter().any(pred)
}

impl ConditionSet {
    pub fn parse(conditions: &[&str]) -> Result<Self> {
        let mut set = ConditionSet::default();
        for text in conditions {
            match text.parse::<Condition>()? {
                Condition::Os(c) => set.os.push(c),
                Condition::Vendor(v) => set.vendors.push(v),
                Condition::Device(v, d) => set.devices.push((v, d)),
                Condition::Angle(a) => set.angle.push(a),
                Condition::Build(b) => set.build.push(b),
                Condition::Browser(b) => set.browser.push(b),
            }
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.os.is_empty()
            && self.vendors.is_empty()
            && self.devices.is_empty()
            && self.angle.is_empty()
            && self.build.is_empty()
            && self.browser.is_empty()
    }

    pub fn matches(&self, config: &GpuConfig) -> bool {
        any_or_empty(&self.os, |c| c.matches(config.os))
            && any_or_empty(&self.vendors, |v| config.vendor == Some(*v))
            && any_or_empty(&self.devices, |(vendor, device)| {
                config.vendor == Some(*vendor)
                    && match device {
                        DeviceMatch::Id(id) => config.device_id == Some(*id),
                        DeviceMatch::Name(name) => config.device_string.as_deref() == Some(name.as_str()),
                    }
            })
            && any_or_empty(&self.angle, |a| config.angle == *a)
            && any_or_empty(&self.build, |b| config.build == *b)
            && any_or_empty(&self.browser, |b| config.browser == Some(*b))
    }
}
