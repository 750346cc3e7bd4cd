//! Platform callback table.
//!
//! The platform integration layer supplies one implementation of
//! [`DevCallbacks`] at startup. The device manager never does hardware work
//! itself; every lifecycle operation ends in one of these slots.

use crate::status::PalResult;
use crate::types::{DevId, DevInitMode, DeviceProfile, SerdesUpgradeMode};
use std::fmt;

/// Names of the slots in the platform callback table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackSlot {
    WarmInitBegin,
    DeviceAdd,
    WarmInitEnd,
    CpuifNetdevNameGet,
    Cpuif10gNetdevNameGet,
    PltfmTypeGet,
    ResetConfig,
    WarmInitErrorSet,
    WarmInitErrorGet,
}

impl CallbackSlot {
    /// Every slot, in table order.
    pub const ALL: [CallbackSlot; 9] = [
        CallbackSlot::WarmInitBegin,
        CallbackSlot::DeviceAdd,
        CallbackSlot::WarmInitEnd,
        CallbackSlot::CpuifNetdevNameGet,
        CallbackSlot::Cpuif10gNetdevNameGet,
        CallbackSlot::PltfmTypeGet,
        CallbackSlot::ResetConfig,
        CallbackSlot::WarmInitErrorSet,
        CallbackSlot::WarmInitErrorGet,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            CallbackSlot::WarmInitBegin => "warm_init_begin",
            CallbackSlot::DeviceAdd => "device_add",
            CallbackSlot::WarmInitEnd => "warm_init_end",
            CallbackSlot::CpuifNetdevNameGet => "cpuif_netdev_name_get",
            CallbackSlot::Cpuif10gNetdevNameGet => "cpuif_10g_netdev_name_get",
            CallbackSlot::PltfmTypeGet => "pltfm_type_get",
            CallbackSlot::ResetConfig => "reset_config",
            CallbackSlot::WarmInitErrorSet => "warm_init_error_set",
            CallbackSlot::WarmInitErrorGet => "warm_init_error_get",
        }
    }
}

impl fmt::Display for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback table supplied by the platform integration layer.
///
/// Implementations must be callable from any control-plane thread. The
/// device manager serializes lifecycle calls per device, but other calls and
/// calls for different devices may arrive concurrently.
///
/// # Rollback contract
///
/// A slot that returns an error must leave the hardware either untouched or
/// rolled back by itself; the device manager keeps the device in its prior
/// lifecycle state and has no way to undo partial hardware work. Anything
/// that cannot be rolled back should be reported through the warm-init
/// error flag.
///
/// # Re-entrancy
///
/// A slot may call back into the device manager to read lifecycle state,
/// take a snapshot, run a netdev or platform-type query, or set and read the
/// error flag of any device; none of these wait on a lifecycle operation.
/// It must not start a lifecycle operation (add, warm init begin/end, reset)
/// on any device. The record of the device whose slot is running stays
/// locked until the slot returns.
pub trait DevCallbacks: Send + Sync {
    /// Starts a warm init on the device.
    fn warm_init_begin(
        &self,
        dev_id: DevId,
        mode: DevInitMode,
        serdes_upgrade_mode: SerdesUpgradeMode,
        upgrade_agents: bool,
    ) -> PalResult<()>;

    /// Adds the device with the given profile.
    fn device_add(&self, dev_id: DevId, profile: &DeviceProfile) -> PalResult<()>;

    /// Completes a warm init started by `warm_init_begin`.
    fn warm_init_end(&self, dev_id: DevId) -> PalResult<()>;

    /// Returns the name of the CPU interface netdev.
    ///
    /// `name_size` is the caller's buffer size including the terminating
    /// NUL. A platform whose name does not fit should fail with
    /// `BfStatus::NoSpace`.
    fn cpuif_netdev_name_get(&self, dev_id: DevId, name_size: usize) -> PalResult<String>;

    /// Returns the name of the 10G CPU interface netdev on the given PCI
    /// bus/device and instance. `name_size` is as for
    /// [`cpuif_netdev_name_get`](Self::cpuif_netdev_name_get).
    fn cpuif_10g_netdev_name_get(
        &self,
        dev_id: DevId,
        pci_bus_dev: &str,
        instance: i32,
        name_size: usize,
    ) -> PalResult<String>;

    /// Returns true if the device is the software model.
    fn pltfm_type_get(&self, dev_id: DevId) -> PalResult<bool>;

    /// Resets the platform configuration of the device.
    fn reset_config(&self, dev_id: DevId) -> PalResult<()>;

    /// Records the warm-init error state.
    fn warm_init_error_set(&self, dev_id: DevId, state: bool) -> PalResult<()>;

    /// Reads the warm-init error state.
    fn warm_init_error_get(&self, dev_id: DevId) -> PalResult<bool>;
}
