//! SONiC ASIC device lifecycle manager.
//!
//! Tracks every ASIC device through add and warm (hitless) reinitialization
//! and forwards the hardware work to a platform callback table supplied at
//! startup. The crate is organized around one context object, [`DevMgr`]:
//!
//! - [`registry`]: the set-once platform callback table and dispatch
//! - [`device`]: per-device lifecycle records and locks
//! - [`warm_init`]: device add, warm init begin/end, config reset
//! - [`error_state`]: the sticky warm-init error flag
//! - [`query`]: CPU interface netdev names and platform type
//! - [`sim_platform`]: software-model platform for the daemon and tests
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use bf_pal::{DeviceProfile, DevInitMode, SerdesUpgradeMode};
//! use sonic_devmgr::{DevMgr, SimPlatform};
//!
//! let mgr = DevMgr::new(4);
//! mgr.register(Arc::new(SimPlatform::new()))?;
//! mgr.device_add(0, Some(&DeviceProfile::with_program("switch")))?;
//! mgr.warm_init_begin(0, DevInitMode::Hitless, SerdesUpgradeMode::None, false)?;
//! mgr.warm_init_end(0)?;
//! ```

pub mod audit;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod error_state;
pub mod query;
pub mod registry;
pub mod sim_platform;
pub mod warm_init;

pub use config::{ConfigError, DevMgrConfig, DeviceEntry, DEFAULT_CONFIG_PATH};
pub use context::DevMgr;
pub use device::{DeviceRegistry, DeviceSnapshot, LifecycleState};
pub use error::{to_status, DevMgrError, Result};
pub use error_state::ErrorStateTracker;
pub use query::QueryFacade;
pub use registry::CallbackRegistry;
pub use sim_platform::{PlatformCall, SimPlatform};
pub use warm_init::{WarmInitOrch, WarmInitRequest, WarmInitStatsSnapshot};
