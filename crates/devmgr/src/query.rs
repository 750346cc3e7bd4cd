//! Read-only platform queries: CPU interface netdev names and platform type.
//!
//! Netdev names are returned to callers that copy them into fixed C buffers,
//! so each query takes the caller's buffer capacity, hands it to the
//! platform as the name size and rejects names that would not fit with
//! their NUL terminator.

use crate::device::DeviceRegistry;
use crate::error::{DevMgrError, Result};
use crate::registry::CallbackRegistry;
use crate::{debug_log, warn_log};
use bf_pal::{CallbackSlot, DevId, PlatformType};
use std::sync::Arc;

#[derive(Debug)]
pub struct QueryFacade {
    callbacks: Arc<CallbackRegistry>,
    devices: Arc<DeviceRegistry>,
}

impl QueryFacade {
    pub fn new(callbacks: Arc<CallbackRegistry>, devices: Arc<DeviceRegistry>) -> Self {
        Self { callbacks, devices }
    }

    /// Name of the CPU interface netdev (e.g. `bf_pci0`).
    pub fn cpuif_netdev_name_get(&self, dev_id: DevId, capacity: usize) -> Result<String> {
        self.devices.check(dev_id)?;

        let name = self
            .callbacks
            .dispatch(CallbackSlot::CpuifNetdevNameGet, dev_id, |cb| {
                cb.cpuif_netdev_name_get(dev_id, capacity)
            })?;

        fit_buffer(dev_id, name, capacity)
    }

    /// Name of the 10G CPU interface netdev on a PCI bus/device.
    pub fn cpuif_10g_netdev_name_get(
        &self,
        dev_id: DevId,
        pci_bus_dev: &str,
        instance: i32,
        capacity: usize,
    ) -> Result<String> {
        self.devices.check(dev_id)?;

        if pci_bus_dev.trim().is_empty() {
            return Err(DevMgrError::InvalidArgument(
                "PCI bus/device is empty".to_string(),
            ));
        }
        if instance < 0 {
            return Err(DevMgrError::InvalidArgument(format!(
                "negative netdev instance {}",
                instance
            )));
        }

        let name = self
            .callbacks
            .dispatch(CallbackSlot::Cpuif10gNetdevNameGet, dev_id, |cb| {
                cb.cpuif_10g_netdev_name_get(dev_id, pci_bus_dev, instance, capacity)
            })?;

        fit_buffer(dev_id, name, capacity)
    }

    pub fn pltfm_type_get(&self, dev_id: DevId) -> Result<PlatformType> {
        self.devices.check(dev_id)?;

        let is_sw_model = self
            .callbacks
            .dispatch(CallbackSlot::PltfmTypeGet, dev_id, |cb| cb.pltfm_type_get(dev_id))?;

        Ok(PlatformType::from_is_sw_model(is_sw_model))
    }
}

fn fit_buffer(dev_id: DevId, name: String, capacity: usize) -> Result<String> {
    let required = name.len() + 1;
    if required > capacity {
        warn_log!(
            "QueryFacade",
            dev_id = dev_id,
            required = required,
            capacity = capacity,
            "Netdev name does not fit caller buffer"
        );
        return Err(DevMgrError::BufferTooSmall { required, capacity });
    }

    debug_log!("QueryFacade", dev_id = dev_id, name = %name, "Netdev name resolved");
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_platform::{PlatformCall, SimPlatform};
    use bf_pal::BfStatus;

    fn setup() -> (QueryFacade, Arc<SimPlatform>) {
        let callbacks = Arc::new(CallbackRegistry::new());
        let devices = Arc::new(DeviceRegistry::new(4));
        let platform = Arc::new(SimPlatform::new());
        callbacks.register(platform.clone()).unwrap();
        (QueryFacade::new(callbacks, devices), platform)
    }

    #[test]
    fn test_netdev_name() {
        let (query, platform) = setup();
        platform.set_netdev_name(1, "eth_cpu");

        assert_eq!(query.cpuif_netdev_name_get(1, 128).unwrap(), "eth_cpu");
        assert_eq!(query.cpuif_netdev_name_get(0, 128).unwrap(), "bf_pci0");
    }

    #[test]
    fn test_capacity_reaches_platform() {
        let (query, platform) = setup();
        let long = "c".repeat(200);
        platform.set_netdev_name(1, long.clone());

        assert_eq!(query.cpuif_netdev_name_get(1, 256).unwrap(), long);
        query
            .cpuif_10g_netdev_name_get(1, "0000:05:00", 0, 300)
            .unwrap();

        let sizes: Vec<_> = platform
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::CpuifNetdevNameGet { name_size, .. }
                | PlatformCall::Cpuif10gNetdevNameGet { name_size, .. } => Some(name_size),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![256, 300]);
    }

    #[test]
    fn test_netdev_name_buffer_bounds() {
        let (query, platform) = setup();
        platform.set_netdev_name(0, "abcd");

        // Exactly fits with the terminator.
        assert_eq!(query.cpuif_netdev_name_get(0, 5).unwrap(), "abcd");
        assert_eq!(
            query.cpuif_netdev_name_get(0, 4),
            Err(DevMgrError::BufferTooSmall {
                required: 5,
                capacity: 4
            })
        );
        assert_eq!(
            query.cpuif_netdev_name_get(0, 0).unwrap_err().status(),
            BfStatus::NoSpace
        );
    }

    #[test]
    fn test_10g_netdev_name() {
        let (query, _platform) = setup();

        assert_eq!(
            query
                .cpuif_10g_netdev_name_get(2, "0000:05:00", 1, 64)
                .unwrap(),
            "bf_10g2_1"
        );
        assert!(matches!(
            query.cpuif_10g_netdev_name_get(2, "0000:05:00", 1, 4),
            Err(DevMgrError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_10g_netdev_name_rejects_bad_args() {
        let (query, platform) = setup();

        assert!(matches!(
            query.cpuif_10g_netdev_name_get(0, "", 0, 64),
            Err(DevMgrError::InvalidArgument(_))
        ));
        assert!(matches!(
            query.cpuif_10g_netdev_name_get(0, "0000:05:00", -1, 64),
            Err(DevMgrError::InvalidArgument(_))
        ));
        assert!(matches!(
            query.cpuif_10g_netdev_name_get(9, "0000:05:00", 0, 64),
            Err(DevMgrError::InvalidDevice { .. })
        ));
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_platform_type() {
        let (query, platform) = setup();

        assert_eq!(query.pltfm_type_get(0).unwrap(), PlatformType::Model);
        platform.set_sw_model(false);
        assert_eq!(query.pltfm_type_get(0).unwrap(), PlatformType::Asic);
    }
}
