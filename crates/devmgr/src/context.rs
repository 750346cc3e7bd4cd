//! The device manager context.

use crate::config::DevMgrConfig;
use crate::device::{DeviceRegistry, DeviceSnapshot, LifecycleState};
use crate::error::Result;
use crate::error_state::ErrorStateTracker;
use crate::query::QueryFacade;
use crate::registry::CallbackRegistry;
use crate::warm_init::{WarmInitOrch, WarmInitStatsSnapshot};
use bf_pal::{
    DevCallbacks, DevId, DevInitMode, DeviceProfile, PlatformType, RawDevCallbacks,
    SerdesUpgradeMode,
};
use std::sync::Arc;

/// Owns the callback table and the device records and exposes the
/// device-lifecycle API.
///
/// One `DevMgr` is built at startup and shared (`Arc<DevMgr>`) with every
/// component that needs it. All methods take `&self` and are safe to call
/// from any thread.
#[derive(Debug)]
pub struct DevMgr {
    callbacks: Arc<CallbackRegistry>,
    devices: Arc<DeviceRegistry>,
    warm_init: WarmInitOrch,
    error_state: ErrorStateTracker,
    query: QueryFacade,
}

impl DevMgr {
    /// Creates a context with `max_dev_count` device slots and no platform.
    pub fn new(max_dev_count: usize) -> Self {
        let callbacks = Arc::new(CallbackRegistry::new());
        let devices = Arc::new(DeviceRegistry::new(max_dev_count));

        Self {
            warm_init: WarmInitOrch::new(callbacks.clone(), devices.clone()),
            error_state: ErrorStateTracker::new(callbacks.clone(), devices.clone()),
            query: QueryFacade::new(callbacks.clone(), devices.clone()),
            callbacks,
            devices,
        }
    }

    pub fn from_config(config: &DevMgrConfig) -> Self {
        Self::new(config.device_manager.max_dev_count)
    }

    /// Installs the platform callback table. Only the first call succeeds.
    pub fn register(&self, table: Arc<dyn DevCallbacks>) -> Result<()> {
        self.callbacks.register(table)
    }

    /// Installs a C platform callback table.
    ///
    /// # Safety
    ///
    /// See [`CallbackRegistry::register_raw`].
    pub unsafe fn register_raw(&self, raw: &RawDevCallbacks) -> Result<()> {
        unsafe { self.callbacks.register_raw(raw) }
    }

    pub fn is_registered(&self) -> bool {
        self.callbacks.is_registered()
    }

    pub fn max_dev_count(&self) -> usize {
        self.devices.max_dev_count()
    }

    pub fn device_add(&self, dev_id: DevId, profile: Option<&DeviceProfile>) -> Result<()> {
        self.warm_init.device_add(dev_id, profile)
    }

    pub fn warm_init_begin(
        &self,
        dev_id: DevId,
        mode: DevInitMode,
        serdes_upgrade_mode: SerdesUpgradeMode,
        upgrade_agents: bool,
    ) -> Result<()> {
        self.warm_init
            .warm_init_begin(dev_id, mode, serdes_upgrade_mode, upgrade_agents)
    }

    pub fn warm_init_end(&self, dev_id: DevId) -> Result<()> {
        self.warm_init.warm_init_end(dev_id)
    }

    pub fn reset_config(&self, dev_id: DevId) -> Result<()> {
        self.warm_init.reset_config(dev_id)
    }

    pub fn error_set(&self, dev_id: DevId, state: bool) -> Result<()> {
        self.error_state.set_error(dev_id, state)
    }

    pub fn error_get(&self, dev_id: DevId) -> Result<bool> {
        self.error_state.get_error(dev_id)
    }

    pub fn error_clear(&self, dev_id: DevId) -> Result<()> {
        self.error_state.clear_error(dev_id)
    }

    /// Last known error flag, without calling the platform.
    pub fn cached_error(&self, dev_id: DevId) -> Result<bool> {
        self.error_state.cached_error(dev_id)
    }

    pub fn cpuif_netdev_name_get(&self, dev_id: DevId, capacity: usize) -> Result<String> {
        self.query.cpuif_netdev_name_get(dev_id, capacity)
    }

    pub fn cpuif_10g_netdev_name_get(
        &self,
        dev_id: DevId,
        pci_bus_dev: &str,
        instance: i32,
        capacity: usize,
    ) -> Result<String> {
        self.query
            .cpuif_10g_netdev_name_get(dev_id, pci_bus_dev, instance, capacity)
    }

    pub fn pltfm_type_get(&self, dev_id: DevId) -> Result<PlatformType> {
        self.query.pltfm_type_get(dev_id)
    }

    pub fn state(&self, dev_id: DevId) -> Result<LifecycleState> {
        self.devices.state(dev_id)
    }

    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        self.devices.snapshot()
    }

    pub fn stats(&self) -> WarmInitStatsSnapshot {
        self.warm_init.stats()
    }
}
