//! Warm-init orchestration logic.

use super::types::{WarmInitRequest, WarmInitStats, WarmInitStatsSnapshot};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::device::{DeviceRegistry, LifecycleState};
use crate::error::{DevMgrError, Result};
use crate::registry::CallbackRegistry;
use crate::{audit_log, debug_log, error_log, info_log, warn_log};
use bf_pal::{CallbackSlot, DevId, DevInitMode, DeviceProfile, SerdesUpgradeMode};
use std::sync::Arc;

/// Drives the device lifecycle:
/// `Unregistered -> Added -> WarmInitInProgress -> Active`, with `Active`
/// able to re-enter `WarmInitInProgress` or be re-added.
///
/// Every operation validates locally before calling the platform, holds the
/// device lock across the callback, and changes state only after the
/// callback succeeds.
#[derive(Debug)]
pub struct WarmInitOrch {
    callbacks: Arc<CallbackRegistry>,
    devices: Arc<DeviceRegistry>,
    stats: WarmInitStats,
}

impl WarmInitOrch {
    pub fn new(callbacks: Arc<CallbackRegistry>, devices: Arc<DeviceRegistry>) -> Self {
        Self {
            callbacks,
            devices,
            stats: WarmInitStats::default(),
        }
    }

    pub fn stats(&self) -> WarmInitStatsSnapshot {
        self.stats.snapshot()
    }

    /// Adds a device, or re-adds an active one.
    pub fn device_add(&self, dev_id: DevId, profile: Option<&DeviceProfile>) -> Result<()> {
        debug_log!("WarmInitOrch", dev_id = dev_id, "Adding device");

        self.check_device(dev_id, "device_add")?;

        let profile = profile.ok_or_else(|| {
            warn_log!("WarmInitOrch", dev_id = dev_id, "Device add without a profile");
            DevMgrError::InvalidArgument("device profile is required".to_string())
        })?;
        profile.validate().map_err(|e| {
            warn_log!("WarmInitOrch", dev_id = dev_id, error = %e, "Malformed device profile");
            DevMgrError::InvalidArgument(e.to_string())
        })?;

        let mut record = self.devices.lock(dev_id)?;
        let prior = record.state();
        if !prior.can_add() {
            return Err(self.illegal_transition(dev_id, "device_add", prior));
        }

        self.callbacks
            .dispatch(CallbackSlot::DeviceAdd, dev_id, |cb| {
                cb.device_add(dev_id, profile)
            })
            .map_err(|e| self.callback_failed(dev_id, "device_add", AuditCategory::DeviceLifecycle, e))?;

        record.set_state(LifecycleState::Added);
        drop(record);
        self.stats.record_device_add();

        info_log!(
            "WarmInitOrch",
            dev_id = dev_id,
            prior_state = %prior,
            programs = profile.programs.len(),
            "Device added"
        );
        audit_log!(
            AuditRecord::new(AuditCategory::DeviceLifecycle, "WarmInitOrch", "device_add")
                .with_outcome(AuditOutcome::Success)
                .with_dev_id(dev_id)
                .with_details(serde_json::json!({
                    "prior_state": prior,
                    "programs": profile
                        .programs
                        .iter()
                        .map(|p| p.name.as_str())
                        .collect::<Vec<_>>(),
                    "coal_mirror_enable": profile.coal_mirror_enable
                }))
        );

        Ok(())
    }

    /// Starts a warm init on an added or active device.
    pub fn warm_init_begin(
        &self,
        dev_id: DevId,
        mode: DevInitMode,
        serdes_upgrade_mode: SerdesUpgradeMode,
        upgrade_agents: bool,
    ) -> Result<()> {
        debug_log!(
            "WarmInitOrch",
            dev_id = dev_id,
            mode = %mode,
            serdes_upgrade_mode = %serdes_upgrade_mode,
            upgrade_agents = upgrade_agents,
            "Beginning warm init"
        );

        self.check_device(dev_id, "warm_init_begin")?;

        let mut record = self.devices.lock(dev_id)?;
        let prior = record.state();
        if !prior.can_begin_warm_init() {
            return Err(self.illegal_transition(dev_id, "warm_init_begin", prior));
        }

        self.callbacks
            .dispatch(CallbackSlot::WarmInitBegin, dev_id, |cb| {
                cb.warm_init_begin(dev_id, mode, serdes_upgrade_mode, upgrade_agents)
            })
            .map_err(|e| self.callback_failed(dev_id, "warm_init_begin", AuditCategory::WarmInit, e))?;

        let request = WarmInitRequest::new(dev_id, mode, serdes_upgrade_mode, upgrade_agents);
        let correlation_id = format!("dev{}-wi{}", dev_id, record.warm_init_cycles() + 1);
        record.begin_warm_init(request.clone());
        drop(record);
        self.stats.record_warm_init_begin();

        info_log!(
            "WarmInitOrch",
            dev_id = dev_id,
            prior_state = %prior,
            mode = %mode,
            "Warm init in progress"
        );
        audit_log!(
            AuditRecord::new(AuditCategory::WarmInit, "WarmInitOrch", "warm_init_begin")
                .with_outcome(AuditOutcome::InProgress)
                .with_dev_id(dev_id)
                .with_correlation_id(correlation_id)
                .with_details(serde_json::json!({
                    "prior_state": prior,
                    "request": request
                }))
        );

        Ok(())
    }

    /// Completes the warm init in progress on a device.
    pub fn warm_init_end(&self, dev_id: DevId) -> Result<()> {
        debug_log!("WarmInitOrch", dev_id = dev_id, "Ending warm init");

        self.check_device(dev_id, "warm_init_end")?;

        let mut record = self.devices.lock(dev_id)?;
        let prior = record.state();
        if !prior.can_end_warm_init() {
            return Err(self.illegal_transition(dev_id, "warm_init_end", prior));
        }

        self.callbacks
            .dispatch(CallbackSlot::WarmInitEnd, dev_id, |cb| cb.warm_init_end(dev_id))
            .map_err(|e| self.callback_failed(dev_id, "warm_init_end", AuditCategory::WarmInit, e))?;

        let correlation_id = format!("dev{}-wi{}", dev_id, record.warm_init_cycles() + 1);
        let completed = record.finish_warm_init();
        let cycles = record.warm_init_cycles();
        drop(record);
        self.stats.record_warm_init_end();

        info_log!(
            "WarmInitOrch",
            dev_id = dev_id,
            warm_init_cycles = cycles,
            "Warm init complete, device active"
        );
        audit_log!(
            AuditRecord::new(AuditCategory::WarmInit, "WarmInitOrch", "warm_init_end")
                .with_outcome(AuditOutcome::Success)
                .with_dev_id(dev_id)
                .with_correlation_id(correlation_id)
                .with_details(serde_json::json!({
                    "request": completed,
                    "warm_init_cycles": cycles
                }))
        );

        Ok(())
    }

    /// Resets the platform configuration of a device. Lifecycle state is
    /// left unchanged.
    pub fn reset_config(&self, dev_id: DevId) -> Result<()> {
        debug_log!("WarmInitOrch", dev_id = dev_id, "Resetting device config");

        self.check_device(dev_id, "reset_config")?;

        let record = self.devices.lock(dev_id)?;
        let state = record.state();

        self.callbacks
            .dispatch(CallbackSlot::ResetConfig, dev_id, |cb| cb.reset_config(dev_id))
            .map_err(|e| self.callback_failed(dev_id, "reset_config", AuditCategory::DeviceLifecycle, e))?;

        drop(record);
        self.stats.record_reset();

        info_log!("WarmInitOrch", dev_id = dev_id, state = %state, "Device config reset");
        audit_log!(
            AuditRecord::new(AuditCategory::DeviceLifecycle, "WarmInitOrch", "reset_config")
                .with_outcome(AuditOutcome::Success)
                .with_dev_id(dev_id)
                .with_details(serde_json::json!({ "state": state }))
        );

        Ok(())
    }

    fn check_device(&self, dev_id: DevId, operation: &'static str) -> Result<()> {
        self.devices.check(dev_id).map_err(|e| {
            warn_log!("WarmInitOrch", dev_id = dev_id, operation = operation, "Invalid device id");
            e
        })
    }

    fn illegal_transition(
        &self,
        dev_id: DevId,
        operation: &'static str,
        state: LifecycleState,
    ) -> DevMgrError {
        self.stats.record_illegal_transition();
        let err = DevMgrError::IllegalTransition {
            dev_id,
            operation,
            state,
        };

        warn_log!("WarmInitOrch", dev_id = dev_id, state = %state, "{}", err);
        audit_log!(
            AuditRecord::new(AuditCategory::DeviceLifecycle, "WarmInitOrch", operation)
                .with_dev_id(dev_id)
                .with_denial(err.to_string())
        );

        err
    }

    fn callback_failed(
        &self,
        dev_id: DevId,
        operation: &'static str,
        category: AuditCategory,
        err: DevMgrError,
    ) -> DevMgrError {
        if err.callback_status().is_some() {
            self.stats.record_callback_failure();
        }

        error_log!("WarmInitOrch", dev_id = dev_id, error = %err, "{} failed, state unchanged", operation);
        audit_log!(AuditRecord::new(category, "WarmInitOrch", operation)
            .with_dev_id(dev_id)
            .with_error(err.to_string()));

        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim_platform::{PlatformCall, SimPlatform};
    use bf_pal::BfStatus;
    use pretty_assertions::assert_eq;

    fn setup(max_dev_count: usize) -> (WarmInitOrch, Arc<DeviceRegistry>, Arc<SimPlatform>) {
        let callbacks = Arc::new(CallbackRegistry::new());
        let devices = Arc::new(DeviceRegistry::new(max_dev_count));
        let platform = Arc::new(SimPlatform::new());
        callbacks.register(platform.clone()).unwrap();
        let orch = WarmInitOrch::new(callbacks, devices.clone());
        (orch, devices, platform)
    }

    fn profile() -> DeviceProfile {
        DeviceProfile::with_program("switch")
    }

    #[test]
    fn test_device_add() {
        let (orch, devices, platform) = setup(4);

        orch.device_add(0, Some(&profile())).unwrap();

        assert_eq!(devices.state(0).unwrap(), LifecycleState::Added);
        assert_eq!(
            platform.calls(),
            vec![PlatformCall::DeviceAdd {
                dev_id: 0,
                programs: vec!["switch".to_string()]
            }]
        );
        assert_eq!(orch.stats().device_adds, 1);
    }

    #[test]
    fn test_device_add_requires_profile() {
        let (orch, devices, platform) = setup(4);

        let result = orch.device_add(0, None);
        assert!(matches!(result, Err(DevMgrError::InvalidArgument(_))));

        let result = orch.device_add(0, Some(&DeviceProfile::default()));
        assert!(matches!(result, Err(DevMgrError::InvalidArgument(_))));

        assert_eq!(devices.state(0).unwrap(), LifecycleState::Unregistered);
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_device_add_twice_is_illegal() {
        let (orch, devices, _platform) = setup(4);

        orch.device_add(1, Some(&profile())).unwrap();
        let result = orch.device_add(1, Some(&profile()));

        assert_eq!(
            result,
            Err(DevMgrError::IllegalTransition {
                dev_id: 1,
                operation: "device_add",
                state: LifecycleState::Added
            })
        );
        assert_eq!(devices.state(1).unwrap(), LifecycleState::Added);
        assert_eq!(orch.stats().illegal_transitions, 1);
    }

    #[test]
    fn test_invalid_device_invokes_no_callback() {
        let (orch, _devices, platform) = setup(4);

        for dev_id in [-1, 4, 100] {
            assert!(matches!(
                orch.device_add(dev_id, Some(&profile())),
                Err(DevMgrError::InvalidDevice { .. })
            ));
            assert!(matches!(
                orch.warm_init_begin(dev_id, DevInitMode::Hitless, SerdesUpgradeMode::None, false),
                Err(DevMgrError::InvalidDevice { .. })
            ));
            assert!(matches!(
                orch.warm_init_end(dev_id),
                Err(DevMgrError::InvalidDevice { .. })
            ));
            assert!(matches!(
                orch.reset_config(dev_id),
                Err(DevMgrError::InvalidDevice { .. })
            ));
        }

        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_warm_init_cycle() {
        let (orch, devices, platform) = setup(4);

        orch.device_add(2, Some(&profile())).unwrap();
        orch.warm_init_begin(2, DevInitMode::FastReconfig, SerdesUpgradeMode::ForcedPortReconfig, true)
            .unwrap();
        assert_eq!(devices.state(2).unwrap(), LifecycleState::WarmInitInProgress);
        assert_eq!(
            devices.lock(2).unwrap().pending().map(|r| r.mode),
            Some(DevInitMode::FastReconfig)
        );

        orch.warm_init_end(2).unwrap();
        assert_eq!(devices.state(2).unwrap(), LifecycleState::Active);
        assert_eq!(devices.lock(2).unwrap().warm_init_cycles(), 1);

        // Active may begin again.
        orch.warm_init_begin(2, DevInitMode::Hitless, SerdesUpgradeMode::None, false)
            .unwrap();
        assert_eq!(devices.state(2).unwrap(), LifecycleState::WarmInitInProgress);

        assert_eq!(
            platform.calls()[1],
            PlatformCall::WarmInitBegin {
                dev_id: 2,
                mode: DevInitMode::FastReconfig,
                serdes_upgrade_mode: SerdesUpgradeMode::ForcedPortReconfig,
                upgrade_agents: true
            }
        );

        let stats = orch.stats();
        assert_eq!(stats.warm_init_begins, 2);
        assert_eq!(stats.warm_init_ends, 1);
    }

    #[test]
    fn test_end_before_begin_is_illegal() {
        let (orch, devices, platform) = setup(4);

        orch.device_add(0, Some(&profile())).unwrap();
        let result = orch.warm_init_end(0);

        assert_eq!(result.unwrap_err().status(), BfStatus::NotReady);
        assert_eq!(devices.state(0).unwrap(), LifecycleState::Added);
        assert_eq!(platform.calls().len(), 1);
    }

    #[test]
    fn test_begin_from_unregistered_is_illegal() {
        let (orch, devices, _platform) = setup(4);

        let result = orch.warm_init_begin(3, DevInitMode::Hitless, SerdesUpgradeMode::None, false);
        assert!(matches!(
            result,
            Err(DevMgrError::IllegalTransition {
                state: LifecycleState::Unregistered,
                ..
            })
        ));
        assert_eq!(devices.state(3).unwrap(), LifecycleState::Unregistered);
    }

    #[test]
    fn test_begin_twice_is_illegal() {
        let (orch, devices, _platform) = setup(4);

        orch.device_add(0, Some(&profile())).unwrap();
        orch.warm_init_begin(0, DevInitMode::Hitless, SerdesUpgradeMode::None, false)
            .unwrap();
        let result = orch.warm_init_begin(0, DevInitMode::Hitless, SerdesUpgradeMode::None, false);

        assert!(matches!(result, Err(DevMgrError::IllegalTransition { .. })));
        assert_eq!(devices.state(0).unwrap(), LifecycleState::WarmInitInProgress);
    }

    #[test]
    fn test_failed_callback_leaves_state() {
        let (orch, devices, platform) = setup(4);

        platform.fail_slot(CallbackSlot::DeviceAdd, BfStatus::HwCommFail);
        let result = orch.device_add(0, Some(&profile()));
        assert_eq!(
            result,
            Err(DevMgrError::CallbackFailure {
                slot: CallbackSlot::DeviceAdd,
                status: BfStatus::HwCommFail
            })
        );
        assert_eq!(devices.state(0).unwrap(), LifecycleState::Unregistered);

        platform.clear_failures();
        orch.device_add(0, Some(&profile())).unwrap();

        platform.fail_slot(CallbackSlot::WarmInitBegin, BfStatus::InitError);
        let result = orch.warm_init_begin(0, DevInitMode::Hitless, SerdesUpgradeMode::None, false);
        assert_eq!(result.unwrap_err().status(), BfStatus::InitError);
        assert_eq!(devices.state(0).unwrap(), LifecycleState::Added);
        assert!(devices.lock(0).unwrap().pending().is_none());

        platform.clear_failures();
        orch.warm_init_begin(0, DevInitMode::Hitless, SerdesUpgradeMode::None, false)
            .unwrap();
        platform.fail_slot(CallbackSlot::WarmInitEnd, BfStatus::HwUpdateFailed);
        assert!(orch.warm_init_end(0).is_err());
        assert_eq!(devices.state(0).unwrap(), LifecycleState::WarmInitInProgress);

        assert_eq!(orch.stats().callback_failures, 3);
    }

    #[test]
    fn test_re_add_active_device() {
        let (orch, devices, _platform) = setup(4);

        orch.device_add(1, Some(&profile())).unwrap();
        orch.warm_init_begin(1, DevInitMode::Hitless, SerdesUpgradeMode::None, false)
            .unwrap();
        orch.warm_init_end(1).unwrap();
        orch.device_add(1, Some(&profile())).unwrap();

        assert_eq!(devices.state(1).unwrap(), LifecycleState::Added);
    }

    #[test]
    fn test_reset_config_keeps_state() {
        let (orch, devices, platform) = setup(4);

        orch.reset_config(0).unwrap();
        assert_eq!(devices.state(0).unwrap(), LifecycleState::Unregistered);

        orch.device_add(0, Some(&profile())).unwrap();
        orch.reset_config(0).unwrap();
        assert_eq!(devices.state(0).unwrap(), LifecycleState::Added);

        assert_eq!(
            platform.calls().last(),
            Some(&PlatformCall::ResetConfig { dev_id: 0 })
        );
        assert_eq!(orch.stats().resets, 2);
    }

    #[test]
    fn test_not_registered() {
        let callbacks = Arc::new(CallbackRegistry::new());
        let devices = Arc::new(DeviceRegistry::new(2));
        let orch = WarmInitOrch::new(callbacks, devices.clone());

        assert_eq!(
            orch.device_add(0, Some(&profile())),
            Err(DevMgrError::NotRegistered)
        );
        assert_eq!(orch.reset_config(1), Err(DevMgrError::NotRegistered));
        assert_eq!(devices.state(0).unwrap(), LifecycleState::Unregistered);
        assert_eq!(orch.stats().callback_failures, 0);
    }
}
