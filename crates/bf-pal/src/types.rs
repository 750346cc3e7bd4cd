//! Device identifiers, warm-init modes and the device profile payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Device identifier (matches `bf_dev_id_t` in C).
///
/// Signed so that out-of-range values coming from callers can be represented
/// and rejected instead of wrapping.
pub type DevId = i32;

/// Default number of device slots supported by the driver.
pub const BF_MAX_DEV_COUNT: usize = 8;

/// Errors for parsing and validating the types in this module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid init mode: {0}")]
    InvalidInitMode(String),

    #[error("invalid serdes upgrade mode: {0}")]
    InvalidSerdesUpgradeMode(String),

    #[error("invalid device profile: {0}")]
    InvalidProfile(String),
}

/// Device initialization mode (`bf_dev_init_mode_t`).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevInitMode {
    /// Full cold initialization; the dataplane is disrupted.
    #[default]
    Cold = 0,
    /// Warm init that replays state into the hardware.
    FastReconfig = 1,
    /// Hitless warm init; forwarding continues throughout.
    Hitless = 2,
    /// Fast reconfig that skips the hardware replay where possible.
    FastReconfigQuick = 3,
}

impl DevInitMode {
    /// Converts a raw C value, returning None for unknown modes.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(DevInitMode::Cold),
            1 => Some(DevInitMode::FastReconfig),
            2 => Some(DevInitMode::Hitless),
            3 => Some(DevInitMode::FastReconfigQuick),
            _ => None,
        }
    }

    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Returns true for every mode other than cold init.
    pub const fn is_warm(&self) -> bool {
        !matches!(self, DevInitMode::Cold)
    }
}

impl fmt::Display for DevInitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DevInitMode::Cold => "cold",
            DevInitMode::FastReconfig => "fast_reconfig",
            DevInitMode::Hitless => "hitless",
            DevInitMode::FastReconfigQuick => "fast_reconfig_quick",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DevInitMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cold" => Ok(DevInitMode::Cold),
            "fast_reconfig" | "fast-reconfig" | "warm" => Ok(DevInitMode::FastReconfig),
            "hitless" => Ok(DevInitMode::Hitless),
            "fast_reconfig_quick" | "fast-reconfig-quick" => Ok(DevInitMode::FastReconfigQuick),
            _ => Err(ParseError::InvalidInitMode(s.to_string())),
        }
    }
}

/// Whether serdes firmware is reflashed during warm init
/// Serdes firmware handling during warm init (`bf_dev_serdes_upgrade_mode_t`).
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerdesUpgradeMode {
    /// Keep the running serdes firmware.
    #[default]
    None = 0,
    /// Upgrade serdes firmware and reconfigure ports as part of warm init.
    ForcedPortReconfig = 1,
    /// Upgrade serdes firmware; ports pick it up on their next reconfig.
    DeferredPortReconfig = 2,
}

impl SerdesUpgradeMode {
    /// Converts a raw C value, returning None for unknown modes.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(SerdesUpgradeMode::None),
            1 => Some(SerdesUpgradeMode::ForcedPortReconfig),
            2 => Some(SerdesUpgradeMode::DeferredPortReconfig),
            _ => None,
        }
    }

    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Returns true if serdes firmware is going to be reflashed.
    pub const fn upgrades_firmware(&self) -> bool {
        !matches!(self, SerdesUpgradeMode::None)
    }
}

impl fmt::Display for SerdesUpgradeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SerdesUpgradeMode::None => "none",
            SerdesUpgradeMode::ForcedPortReconfig => "forced_port_reconfig",
            SerdesUpgradeMode::DeferredPortReconfig => "deferred_port_reconfig",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SerdesUpgradeMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(SerdesUpgradeMode::None),
            "forced_port_reconfig" | "forced" => Ok(SerdesUpgradeMode::ForcedPortReconfig),
            "deferred_port_reconfig" | "deferred" => Ok(SerdesUpgradeMode::DeferredPortReconfig),
            _ => Err(ParseError::InvalidSerdesUpgradeMode(s.to_string())),
        }
    }
}

/// Whether a device is backed by the software model or by real silicon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    /// Software model of the ASIC.
    Model,
    /// Physical ASIC.
    Asic,
}

impl PlatformType {
    /// Maps the platform's `is_sw_model` answer.
    pub const fn from_is_sw_model(is_sw_model: bool) -> Self {
        if is_sw_model {
            PlatformType::Model
        } else {
            PlatformType::Asic
        }
    }

    pub const fn is_sw_model(&self) -> bool {
        matches!(self, PlatformType::Model)
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformType::Model => write!(f, "model"),
            PlatformType::Asic => write!(f, "asic"),
        }
    }
}

/// A P4 program to load on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct P4Program {
    /// Program name (e.g. "switch").
    pub name: String,
    /// BF-RT json for the program.
    #[serde(default)]
    pub bfrt_config: Option<PathBuf>,
    /// Pipeline names the program is compiled into.
    #[serde(default)]
    pub pipelines: Vec<String>,
}

/// Device profile handed to the platform on device add
/// (`bf_device_profile_t`).
///
/// The device manager treats the content as opaque; it only makes sure the
/// profile is present and minimally well formed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceProfile {
    #[serde(default)]
    pub programs: Vec<P4Program>,
    /// Enable coalesced mirroring.
    #[serde(default)]
    pub coal_mirror_enable: bool,
    /// Serdes profile name to apply.
    #[serde(default)]
    pub sds_profile: Option<String>,
}

impl DeviceProfile {
    /// Creates a profile carrying a single program.
    pub fn with_program(name: impl Into<String>) -> Self {
        Self {
            programs: vec![P4Program {
                name: name.into(),
                bfrt_config: None,
                pipelines: Vec::new(),
            }],
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ParseError> {
        if self.programs.is_empty() {
            return Err(ParseError::InvalidProfile(
                "profile has no programs".to_string(),
            ));
        }

        if let Some(idx) = self.programs.iter().position(|p| p.name.trim().is_empty()) {
            return Err(ParseError::InvalidProfile(format!(
                "program {} has an empty name",
                idx
            )));
        }

        Ok(())
    }
}
