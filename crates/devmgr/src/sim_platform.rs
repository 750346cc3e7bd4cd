//! Software-model platform.
//!
//! `SimPlatform` implements the callback table without hardware. The daemon
//! runs against it when no real platform is linked in, and the tests use it
//! to observe and fail individual callbacks.

use bf_pal::{
    BfStatus, CallbackSlot, DevCallbacks, DevId, DevInitMode, DeviceProfile, PalResult,
    SerdesUpgradeMode,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// One recorded callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    WarmInitBegin {
        dev_id: DevId,
        mode: DevInitMode,
        serdes_upgrade_mode: SerdesUpgradeMode,
        upgrade_agents: bool,
    },
    DeviceAdd {
        dev_id: DevId,
        programs: Vec<String>,
    },
    WarmInitEnd {
        dev_id: DevId,
    },
    CpuifNetdevNameGet {
        dev_id: DevId,
        name_size: usize,
    },
    Cpuif10gNetdevNameGet {
        dev_id: DevId,
        pci_bus_dev: String,
        instance: i32,
        name_size: usize,
    },
    PltfmTypeGet {
        dev_id: DevId,
    },
    ResetConfig {
        dev_id: DevId,
    },
    WarmInitErrorSet {
        dev_id: DevId,
        state: bool,
    },
    WarmInitErrorGet {
        dev_id: DevId,
    },
}

impl PlatformCall {
    pub fn slot(&self) -> CallbackSlot {
        match self {
            PlatformCall::WarmInitBegin { .. } => CallbackSlot::WarmInitBegin,
            PlatformCall::DeviceAdd { .. } => CallbackSlot::DeviceAdd,
            PlatformCall::WarmInitEnd { .. } => CallbackSlot::WarmInitEnd,
            PlatformCall::CpuifNetdevNameGet { .. } => CallbackSlot::CpuifNetdevNameGet,
            PlatformCall::Cpuif10gNetdevNameGet { .. } => CallbackSlot::Cpuif10gNetdevNameGet,
            PlatformCall::PltfmTypeGet { .. } => CallbackSlot::PltfmTypeGet,
            PlatformCall::ResetConfig { .. } => CallbackSlot::ResetConfig,
            PlatformCall::WarmInitErrorSet { .. } => CallbackSlot::WarmInitErrorSet,
            PlatformCall::WarmInitErrorGet { .. } => CallbackSlot::WarmInitErrorGet,
        }
    }
}

/// In-process platform backed by the software model.
#[derive(Debug)]
pub struct SimPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    failures: Mutex<HashMap<CallbackSlot, BfStatus>>,
    error_flags: Mutex<HashMap<DevId, bool>>,
    netdev_names: Mutex<HashMap<DevId, String>>,
    sw_model: AtomicBool,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPlatform {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            error_flags: Mutex::new(HashMap::new()),
            netdev_names: Mutex::new(HashMap::new()),
            sw_model: AtomicBool::new(true),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Makes every lifecycle callback (add, begin, end, reset) take at least
    /// `latency`, the way a real reinit does.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, slot: CallbackSlot) -> Vec<PlatformCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.slot() == slot)
            .cloned()
            .collect()
    }

    /// Makes `slot` fail with `status` until cleared.
    pub fn fail_slot(&self, slot: CallbackSlot, status: BfStatus) {
        self.failures.lock().insert(slot, status);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    pub fn set_netdev_name(&self, dev_id: DevId, name: impl Into<String>) {
        self.netdev_names.lock().insert(dev_id, name.into());
    }

    /// Changes the error flag on the platform side only, as a platform
    /// agent would after detecting a fault.
    pub fn set_platform_error(&self, dev_id: DevId, state: bool) {
        self.error_flags.lock().insert(dev_id, state);
    }

    pub fn set_sw_model(&self, sw_model: bool) {
        self.sw_model.store(sw_model, Ordering::SeqCst);
    }

    /// Highest number of lifecycle callbacks observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, call: PlatformCall) -> PalResult<()> {
        let slot = call.slot();
        self.calls.lock().push(call);
        match self.failures.lock().get(&slot) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }

    fn slow_call(&self, call: PlatformCall) -> PalResult<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let result = self.enter(call);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl DevCallbacks for SimPlatform {
    fn warm_init_begin(
        &self,
        dev_id: DevId,
        mode: DevInitMode,
        serdes_upgrade_mode: SerdesUpgradeMode,
        upgrade_agents: bool,
    ) -> PalResult<()> {
        self.slow_call(PlatformCall::WarmInitBegin {
            dev_id,
            mode,
            serdes_upgrade_mode,
            upgrade_agents,
        })
    }

    fn device_add(&self, dev_id: DevId, profile: &DeviceProfile) -> PalResult<()> {
        self.slow_call(PlatformCall::DeviceAdd {
            dev_id,
            programs: profile.programs.iter().map(|p| p.name.clone()).collect(),
        })
    }

    fn warm_init_end(&self, dev_id: DevId) -> PalResult<()> {
        self.slow_call(PlatformCall::WarmInitEnd { dev_id })
    }

    fn cpuif_netdev_name_get(&self, dev_id: DevId, name_size: usize) -> PalResult<String> {
        self.enter(PlatformCall::CpuifNetdevNameGet { dev_id, name_size })?;
        Ok(self
            .netdev_names
            .lock()
            .get(&dev_id)
            .cloned()
            .unwrap_or_else(|| format!("bf_pci{}", dev_id)))
    }

    fn cpuif_10g_netdev_name_get(
        &self,
        dev_id: DevId,
        pci_bus_dev: &str,
        instance: i32,
        name_size: usize,
    ) -> PalResult<String> {
        self.enter(PlatformCall::Cpuif10gNetdevNameGet {
            dev_id,
            pci_bus_dev: pci_bus_dev.to_string(),
            instance,
            name_size,
        })?;
        Ok(format!("bf_10g{}_{}", dev_id, instance))
    }

    fn pltfm_type_get(&self, dev_id: DevId) -> PalResult<bool> {
        self.enter(PlatformCall::PltfmTypeGet { dev_id })?;
        Ok(self.sw_model.load(Ordering::SeqCst))
    }

    fn reset_config(&self, dev_id: DevId) -> PalResult<()> {
        self.slow_call(PlatformCall::ResetConfig { dev_id })
    }

    fn warm_init_error_set(&self, dev_id: DevId, state: bool) -> PalResult<()> {
        self.enter(PlatformCall::WarmInitErrorSet { dev_id, state })?;
        self.error_flags.lock().insert(dev_id, state);
        Ok(())
    }

    fn warm_init_error_get(&self, dev_id: DevId) -> PalResult<bool> {
        self.enter(PlatformCall::WarmInitErrorGet { dev_id })?;
        Ok(self
            .error_flags
            .lock()
            .get(&dev_id)
            .copied()
            .unwrap_or(false))
    }
}
