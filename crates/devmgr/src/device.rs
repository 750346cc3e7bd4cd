//! Per-device lifecycle records.
//!
//! The registry preallocates one slot per device id in `[0, max_dev_count)`.
//! Slots are never freed. Each slot has one lock, the record lock, held by
//! the warm-init orchestrator across a platform callback. It serializes
//! lifecycle operations on one device and is the only lock in the registry.
//!
//! Every change made through a [`DeviceGuard`] is also published to
//! per-slot atomics. State reads, snapshots and the warm-init error flag go
//! through those atomics and never wait on a record lock, so a platform
//! callback may read any device or report an error while a lifecycle
//! operation is in flight.

use crate::error::{DevMgrError, Result};
use crate::warm_init::WarmInitRequest;
use bf_pal::DevId;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Lifecycle state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Unregistered,
    Added,
    WarmInitInProgress,
    Active,
}

impl LifecycleState {
    /// Returns true if `device_add` is allowed from this state.
    pub const fn can_add(&self) -> bool {
        matches!(self, LifecycleState::Unregistered | LifecycleState::Active)
    }

    /// Returns true if `warm_init_begin` is allowed from this state.
    pub const fn can_begin_warm_init(&self) -> bool {
        matches!(self, LifecycleState::Added | LifecycleState::Active)
    }

    /// Returns true if `warm_init_end` is allowed from this state.
    pub const fn can_end_warm_init(&self) -> bool {
        matches!(self, LifecycleState::WarmInitInProgress)
    }

    const fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Unregistered => 0,
            LifecycleState::Added => 1,
            LifecycleState::WarmInitInProgress => 2,
            LifecycleState::Active => 3,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LifecycleState::Added,
            2 => LifecycleState::WarmInitInProgress,
            3 => LifecycleState::Active,
            _ => LifecycleState::Unregistered,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Unregistered => write!(f, "unregistered"),
            LifecycleState::Added => write!(f, "added"),
            LifecycleState::WarmInitInProgress => write!(f, "warm_init_in_progress"),
            LifecycleState::Active => write!(f, "active"),
        }
    }
}

/// Lifecycle record of one device, reachable only through a
/// [`DeviceGuard`].
#[derive(Debug, Default)]
struct DeviceRecord {
    state: LifecycleState,
    pending: Option<WarmInitRequest>,
    warm_init_cycles: u64,
}

#[derive(Debug, Default)]
struct DeviceSlot {
    record: Mutex<DeviceRecord>,
    state: AtomicU8,
    warm_init_cycles: AtomicU64,
    error_flag: AtomicBool,
}

/// Exclusive access to one device record.
///
/// Mutations are written to the record and published to the slot before
/// the call returns.
#[derive(Debug)]
pub struct DeviceGuard<'a> {
    record: MutexGuard<'a, DeviceRecord>,
    slot: &'a DeviceSlot,
}

impl DeviceGuard<'_> {
    pub fn state(&self) -> LifecycleState {
        self.record.state
    }

    /// The warm init currently in progress, if any.
    pub fn pending(&self) -> Option<&WarmInitRequest> {
        self.record.pending.as_ref()
    }

    /// Number of completed warm-init cycles.
    pub fn warm_init_cycles(&self) -> u64 {
        self.record.warm_init_cycles
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.record.state = state;
        self.publish();
    }

    pub(crate) fn begin_warm_init(&mut self, request: WarmInitRequest) {
        self.record.state = LifecycleState::WarmInitInProgress;
        self.record.pending = Some(request);
        self.publish();
    }

    /// Moves to `Active` and returns the request that was completed.
    pub(crate) fn finish_warm_init(&mut self) -> Option<WarmInitRequest> {
        self.record.state = LifecycleState::Active;
        self.record.warm_init_cycles += 1;
        self.publish();
        self.record.pending.take()
    }

    fn publish(&self) {
        self.slot
            .warm_init_cycles
            .store(self.record.warm_init_cycles, Ordering::SeqCst);
        self.slot
            .state
            .store(self.record.state.as_u8(), Ordering::SeqCst);
    }
}

/// Point-in-time view of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    pub dev_id: DevId,
    pub state: LifecycleState,
    pub error_flag: bool,
    pub warm_init_cycles: u64,
}

/// Fixed-size arena of device records indexed by device id.
#[derive(Debug)]
pub struct DeviceRegistry {
    slots: Vec<DeviceSlot>,
}

impl DeviceRegistry {
    pub fn new(max_dev_count: usize) -> Self {
        let slots = (0..max_dev_count).map(|_| DeviceSlot::default()).collect();
        Self { slots }
    }

    pub fn max_dev_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if `dev_id` is in `[0, max_dev_count)`.
    pub fn valid_device(&self, dev_id: DevId) -> bool {
        self.index(dev_id).is_some()
    }

    /// Fails with `InvalidDevice` for out-of-range ids.
    pub fn check(&self, dev_id: DevId) -> Result<()> {
        self.slot(dev_id).map(|_| ())
    }

    /// Locks the lifecycle record of a device.
    ///
    /// Blocks while another lifecycle operation on the same device is in
    /// flight.
    pub fn lock(&self, dev_id: DevId) -> Result<DeviceGuard<'_>> {
        let slot = self.slot(dev_id)?;
        Ok(DeviceGuard {
            record: slot.record.lock(),
            slot,
        })
    }

    /// Last published lifecycle state. Never blocks.
    pub fn state(&self, dev_id: DevId) -> Result<LifecycleState> {
        let slot = self.slot(dev_id)?;
        Ok(LifecycleState::from_u8(slot.state.load(Ordering::SeqCst)))
    }

    /// Cached warm-init error flag, without asking the platform.
    pub fn error_flag(&self, dev_id: DevId) -> Result<bool> {
        Ok(self.slot(dev_id)?.error_flag.load(Ordering::SeqCst))
    }

    /// Stores the cached error flag and returns the previous value.
    pub(crate) fn store_error_flag(&self, dev_id: DevId, state: bool) -> Result<bool> {
        Ok(self.slot(dev_id)?.error_flag.swap(state, Ordering::SeqCst))
    }

    /// Snapshot of every slot, in id order. Never blocks.
    pub fn snapshot(&self) -> Vec<DeviceSnapshot> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| DeviceSnapshot {
                dev_id: idx as DevId,
                state: LifecycleState::from_u8(slot.state.load(Ordering::SeqCst)),
                error_flag: slot.error_flag.load(Ordering::SeqCst),
                warm_init_cycles: slot.warm_init_cycles.load(Ordering::SeqCst),
            })
            .collect()
    }

    fn index(&self, dev_id: DevId) -> Option<usize> {
        usize::try_from(dev_id)
            .ok()
            .filter(|&idx| idx < self.slots.len())
    }

    fn slot(&self, dev_id: DevId) -> Result<&DeviceSlot> {
        self.index(dev_id)
            .map(|idx| &self.slots[idx])
            .ok_or(DevMgrError::InvalidDevice {
                dev_id,
                max_dev_count: self.slots.len(),
            })
    }
}
