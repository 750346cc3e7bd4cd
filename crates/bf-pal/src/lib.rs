//! Platform abstraction layer (PAL) for ASIC device management.
//!
//! This crate defines the contract between the generic device manager and
//! the platform integration layer that does the real hardware work:
//!
//! - [`status`]: `bf_status_t` codes and the callback result type
//! - [`types`]: device ids, warm-init and serdes upgrade modes, device profiles
//! - [`callbacks`]: the [`DevCallbacks`] table a platform implements
//! - [`ffi`]: the C layout of the callback table and its validated adapter
//!
//! # Example
//!
//! ```ignore
//! use bf_pal::{DevCallbacks, DevInitMode, PalResult, SerdesUpgradeMode};
//!
//! fn upgrade(cb: &dyn DevCallbacks) -> PalResult<()> {
//!     cb.warm_init_begin(0, DevInitMode::Hitless, SerdesUpgradeMode::None, false)?;
//!     cb.warm_init_end(0)
//! }
//! ```

pub mod callbacks;
pub mod ffi;
pub mod status;
pub mod types;

pub use callbacks::{CallbackSlot, DevCallbacks};
pub use ffi::{FfiDevCallbacks, RawDevCallbacks, RawDeviceProfile};
pub use status::{BfStatus, BfStatusExt, PalError, PalResult};
pub use types::{
    DevId, DevInitMode, DeviceProfile, P4Program, ParseError, PlatformType, SerdesUpgradeMode,
    BF_MAX_DEV_COUNT,
};
