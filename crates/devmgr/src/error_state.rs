//! Sticky warm-init error flag per device.
//!
//! The platform is the source of truth for the flag. A set is forwarded to
//! the platform first and cached only once the platform accepts it; a get
//! asks the platform and caches whatever it answers. No lock is held while
//! the platform runs, so these calls are safe from inside a callback.

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::device::DeviceRegistry;
use crate::error::Result;
use crate::registry::CallbackRegistry;
use crate::{debug_log, security_audit, warn_log};
use bf_pal::{CallbackSlot, DevId};
use std::sync::Arc;

#[derive(Debug)]
pub struct ErrorStateTracker {
    callbacks: Arc<CallbackRegistry>,
    devices: Arc<DeviceRegistry>,
}

impl ErrorStateTracker {
    pub fn new(callbacks: Arc<CallbackRegistry>, devices: Arc<DeviceRegistry>) -> Self {
        Self { callbacks, devices }
    }

    /// Sets or clears the warm-init error flag.
    ///
    /// The flag never blocks lifecycle operations; it is only reported.
    pub fn set_error(&self, dev_id: DevId, state: bool) -> Result<()> {
        self.devices.check(dev_id).map_err(|e| {
            warn_log!("ErrorStateTracker", dev_id = dev_id, "Invalid device id");
            e
        })?;

        self.callbacks
            .dispatch(CallbackSlot::WarmInitErrorSet, dev_id, |cb| {
                cb.warm_init_error_set(dev_id, state)
            })?;

        let previous = self.devices.store_error_flag(dev_id, state)?;

        if previous != state {
            security_audit!(AuditRecord::new(
                AuditCategory::ErrorState,
                "ErrorStateTracker",
                "warm_init_error_set"
            )
            .with_outcome(AuditOutcome::Success)
            .with_dev_id(dev_id)
            .with_details(serde_json::json!({
                "previous": previous,
                "state": state
            })));
        } else {
            debug_log!("ErrorStateTracker", dev_id = dev_id, state = state, "Error flag unchanged");
        }

        Ok(())
    }

    /// Reads the error flag from the platform and caches the answer.
    pub fn get_error(&self, dev_id: DevId) -> Result<bool> {
        self.devices.check(dev_id)?;

        let state = self
            .callbacks
            .dispatch(CallbackSlot::WarmInitErrorGet, dev_id, |cb| {
                cb.warm_init_error_get(dev_id)
            })?;

        let cached = self.devices.store_error_flag(dev_id, state)?;
        if cached != state {
            debug_log!(
                "ErrorStateTracker",
                dev_id = dev_id,
                cached = cached,
                platform = state,
                "Platform error flag differs from cache, adopting platform value"
            );
        }

        Ok(state)
    }

    pub fn clear_error(&self, dev_id: DevId) -> Result<()> {
        self.set_error(dev_id, false)
    }

    /// Last known flag, without calling the platform.
    pub fn cached_error(&self, dev_id: DevId) -> Result<bool> {
        self.devices.error_flag(dev_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DevMgrError;
    use crate::sim_platform::SimPlatform;
    use bf_pal::BfStatus;

    fn setup() -> (ErrorStateTracker, Arc<SimPlatform>) {
        let callbacks = Arc::new(CallbackRegistry::new());
        let devices = Arc::new(DeviceRegistry::new(4));
        let platform = Arc::new(SimPlatform::new());
        callbacks.register(platform.clone()).unwrap();
        (ErrorStateTracker::new(callbacks, devices), platform)
    }

    #[test]
    fn test_set_then_get() {
        let (tracker, _platform) = setup();

        tracker.set_error(1, true).unwrap();
        assert_eq!(tracker.cached_error(1), Ok(true));
        assert_eq!(tracker.get_error(1), Ok(true));
        assert_eq!(tracker.cached_error(0), Ok(false));

        tracker.clear_error(1).unwrap();
        assert_eq!(tracker.get_error(1), Ok(false));
    }

    #[test]
    fn test_get_reads_through() {
        let (tracker, platform) = setup();

        platform.set_platform_error(2, true);
        assert_eq!(tracker.cached_error(2), Ok(false));
        assert_eq!(tracker.get_error(2), Ok(true));
        assert_eq!(tracker.cached_error(2), Ok(true));
    }

    #[test]
    fn test_failed_set_does_not_cache() {
        let (tracker, platform) = setup();

        platform.fail_slot(CallbackSlot::WarmInitErrorSet, BfStatus::HwCommFail);
        let result = tracker.set_error(0, true);

        assert_eq!(result.unwrap_err().status(), BfStatus::HwCommFail);
        assert_eq!(tracker.cached_error(0), Ok(false));
    }

    #[test]
    fn test_invalid_device() {
        let (tracker, platform) = setup();

        assert!(matches!(
            tracker.set_error(4, true),
            Err(DevMgrError::InvalidDevice { .. })
        ));
        assert!(matches!(
            tracker.get_error(-1),
            Err(DevMgrError::InvalidDevice { .. })
        ));
        assert!(platform.calls().is_empty());
    }
}
