//! Error types for the device manager.

use crate::device::LifecycleState;
use bf_pal::{BfStatus, CallbackSlot, DevId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DevMgrError>;

/// Device manager errors.
///
/// Every kind except `CallbackFailure` is detected locally before any
/// platform callback runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DevMgrError {
    /// Device id outside `[0, max_dev_count)`
    #[error("Invalid device id {dev_id} (max device count {max_dev_count})")]
    InvalidDevice { dev_id: DevId, max_dev_count: usize },

    /// Missing or malformed payload
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Lifecycle precondition not met
    #[error("Illegal transition on device {dev_id}: {operation} not allowed in state {state}")]
    IllegalTransition {
        dev_id: DevId,
        operation: &'static str,
        state: LifecycleState,
    },

    /// Dispatch attempted before a callback table was registered
    #[error("Platform callbacks not registered")]
    NotRegistered,

    /// A callback table is already registered
    #[error("Platform callbacks already registered")]
    AlreadyRegistered,

    /// Caller buffer cannot hold the result
    #[error("Buffer too small: {required} bytes required, {capacity} available")]
    BufferTooSmall { required: usize, capacity: usize },

    /// Platform callback failed; the status is the platform's own
    #[error("Platform callback {slot} failed: {status}")]
    CallbackFailure { slot: CallbackSlot, status: BfStatus },
}

impl DevMgrError {
    /// Maps the error onto the shared status enumeration.
    ///
    /// Callback failures return the platform status unchanged.
    pub fn status(&self) -> BfStatus {
        match self {
            DevMgrError::InvalidDevice { .. } | DevMgrError::InvalidArgument(_) => {
                BfStatus::InvalidArg
            }
            DevMgrError::IllegalTransition { .. } => BfStatus::NotReady,
            DevMgrError::NotRegistered => BfStatus::NotImplemented,
            DevMgrError::AlreadyRegistered => BfStatus::AlreadyExists,
            DevMgrError::BufferTooSmall { .. } => BfStatus::NoSpace,
            DevMgrError::CallbackFailure { status, .. } => *status,
        }
    }

    /// Returns the platform status if this error came from a callback.
    pub fn callback_status(&self) -> Option<BfStatus> {
        match self {
            DevMgrError::CallbackFailure { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Converts an operation result into the status code returned to C callers.
pub fn to_status<T>(result: &Result<T>) -> BfStatus {
    match result {
        Ok(_) => BfStatus::Success,
        Err(e) => e.status(),
    }
}
