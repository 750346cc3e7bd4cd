//! Configuration file support for devmgrd.
//!
//! Loads and validates the device manager configuration from TOML.
//! Default location: /etc/sonic/devmgrd.conf

use crate::warn_log;
use bf_pal::{DevId, DevInitMode, DeviceProfile, SerdesUpgradeMode, BF_MAX_DEV_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/devmgrd.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Device manager limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceManagerConfig {
    /// Number of device slots; valid ids are `0..max_dev_count`
    #[serde(default = "default_max_dev_count")]
    pub max_dev_count: usize,
}

/// Parameters used when the daemon runs a warm-init cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmInitConfig {
    #[serde(default = "default_warm_init_mode")]
    pub mode: DevInitMode,

    #[serde(default)]
    pub serdes_upgrade_mode: SerdesUpgradeMode,

    #[serde(default)]
    pub upgrade_agents: bool,
}

/// Software-model platform settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Simulated duration of each lifecycle callback in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
}

/// One device to add at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub dev_id: DevId,

    #[serde(default)]
    pub profile: DeviceProfile,

    /// CPU interface netdev reported by the software model
    #[serde(default)]
    pub cpuif_netdev_name: Option<String>,
}

/// Complete devmgrd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevMgrConfig {
    #[serde(default)]
    pub device_manager: DeviceManagerConfig,

    #[serde(default)]
    pub warm_init: WarmInitConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

fn default_max_dev_count() -> usize {
    BF_MAX_DEV_COUNT
}

fn default_warm_init_mode() -> DevInitMode {
    DevInitMode::FastReconfig
}

impl Default for DeviceManagerConfig {
    fn default() -> Self {
        Self {
            max_dev_count: default_max_dev_count(),
        }
    }
}

impl Default for WarmInitConfig {
    fn default() -> Self {
        Self {
            mode: default_warm_init_mode(),
            serdes_upgrade_mode: SerdesUpgradeMode::default(),
            upgrade_agents: false,
        }
    }
}

impl DevMgrConfig {
    /// Load configuration from file, falling back to defaults if the file
    /// does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn_log!(
                    "DevMgrConfig",
                    path = %path.display(),
                    "Config file not found, using defaults"
                );
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Load from the default location or defaults
    pub fn load() -> Result<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn platform_latency(&self) -> Duration {
        Duration::from_millis(self.platform.latency_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let max = self.device_manager.max_dev_count;
        if max == 0 || max > BF_MAX_DEV_COUNT {
            return Err(ConfigError::Invalid(format!(
                "max_dev_count must be 1-{}",
                BF_MAX_DEV_COUNT
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.devices {
            if entry.dev_id < 0 || entry.dev_id as usize >= max {
                return Err(ConfigError::Invalid(format!(
                    "device {} outside 0..{}",
                    entry.dev_id, max
                )));
            }
            if !seen.insert(entry.dev_id) {
                return Err(ConfigError::Invalid(format!(
                    "device {} listed more than once",
                    entry.dev_id
                )));
            }
            entry.profile.validate().map_err(|e| {
                ConfigError::Invalid(format!("device {}: {}", entry.dev_id, e))
            })?;
        }

        Ok(())
    }
}
