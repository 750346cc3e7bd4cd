//! Warm-init request and orchestrator statistics.

use bf_pal::{DevId, DevInitMode, SerdesUpgradeMode};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Parameters of one warm-init cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmInitRequest {
    pub dev_id: DevId,
    pub mode: DevInitMode,
    pub serdes_upgrade_mode: SerdesUpgradeMode,
    /// Reload the platform agents as part of the upgrade.
    pub upgrade_agents: bool,
}

impl WarmInitRequest {
    pub fn new(
        dev_id: DevId,
        mode: DevInitMode,
        serdes_upgrade_mode: SerdesUpgradeMode,
        upgrade_agents: bool,
    ) -> Self {
        Self {
            dev_id,
            mode,
            serdes_upgrade_mode,
            upgrade_agents,
        }
    }
}

/// Orchestrator counters, updated without holding any device lock.
#[derive(Debug, Default)]
pub struct WarmInitStats {
    device_adds: AtomicU64,
    warm_init_begins: AtomicU64,
    warm_init_ends: AtomicU64,
    resets: AtomicU64,
    callback_failures: AtomicU64,
    illegal_transitions: AtomicU64,
}

/// Copy of [`WarmInitStats`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmInitStatsSnapshot {
    pub device_adds: u64,
    pub warm_init_begins: u64,
    pub warm_init_ends: u64,
    pub resets: u64,
    pub callback_failures: u64,
    pub illegal_transitions: u64,
}

impl WarmInitStats {
    pub(crate) fn record_device_add(&self) {
        self.device_adds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_warm_init_begin(&self) {
        self.warm_init_begins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_warm_init_end(&self) {
        self.warm_init_ends.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_callback_failure(&self) {
        self.callback_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_illegal_transition(&self) {
        self.illegal_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WarmInitStatsSnapshot {
        WarmInitStatsSnapshot {
            device_adds: self.device_adds.load(Ordering::Relaxed),
            warm_init_begins: self.warm_init_begins.load(Ordering::Relaxed),
            warm_init_ends: self.warm_init_ends.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            callback_failures: self.callback_failures.load(Ordering::Relaxed),
            illegal_transitions: self.illegal_transitions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = WarmInitStats::default();
        stats.record_device_add();
        stats.record_warm_init_begin();
        stats.record_warm_init_begin();
        stats.record_illegal_transition();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.device_adds, 1);
        assert_eq!(snapshot.warm_init_begins, 2);
        assert_eq!(snapshot.warm_init_ends, 0);
        assert_eq!(snapshot.illegal_transitions, 1);
    }

    #[test]
    fn test_request_serializes_modes_by_name() {
        let request = WarmInitRequest::new(
            1,
            DevInitMode::FastReconfig,
            SerdesUpgradeMode::DeferredPortReconfig,
            false,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mode"], "fast_reconfig");
        assert_eq!(json["serdes_upgrade_mode"], "deferred_port_reconfig");
        assert_eq!(json["upgrade_agents"], false);
    }
}
