//! Platform status codes and error handling.
//!
//! This module mirrors the driver's `bf_status_t` codes so that results
//! coming back from a platform callback can be carried through the device
//! manager untouched and handed back to C callers verbatim.

use std::fmt;
use thiserror::Error;

/// Status codes matching `bf_status_t` in the driver headers.
///
/// Codes the driver headers do not define are kept as `Other` with their
/// raw value, so a platform status always survives the trip back to C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BfStatus {
    Success,
    NotReady,
    NoSysResources,
    InvalidArg,
    AlreadyExists,
    HwCommFail,
    ObjectNotFound,
    MaxSessionsExceeded,
    SessionNotFound,
    NoSpace,
    Eagain,
    InitError,
    TxnNotSupported,
    TableLocked,
    Io,
    Unexpected,
    EntryReferencesExist,
    NotSupported,
    HwUpdateFailed,
    NoLearnClients,
    IdleUpdateInProgress,
    DeviceLocked,
    InternalError,
    TableNotFound,
    InUse,
    NotImplemented,
    /// A code outside the known `bf_status_t` range.
    Other(i32),
}

impl BfStatus {
    /// Creates a BfStatus from a raw i32 value.
    ///
    /// Codes the driver does not define are kept verbatim as `Other`.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => BfStatus::Success,
            1 => BfStatus::NotReady,
            2 => BfStatus::NoSysResources,
            3 => BfStatus::InvalidArg,
            4 => BfStatus::AlreadyExists,
            5 => BfStatus::HwCommFail,
            6 => BfStatus::ObjectNotFound,
            7 => BfStatus::MaxSessionsExceeded,
            8 => BfStatus::SessionNotFound,
            9 => BfStatus::NoSpace,
            10 => BfStatus::Eagain,
            11 => BfStatus::InitError,
            12 => BfStatus::TxnNotSupported,
            13 => BfStatus::TableLocked,
            14 => BfStatus::Io,
            15 => BfStatus::Unexpected,
            16 => BfStatus::EntryReferencesExist,
            17 => BfStatus::NotSupported,
            18 => BfStatus::HwUpdateFailed,
            19 => BfStatus::NoLearnClients,
            20 => BfStatus::IdleUpdateInProgress,
            21 => BfStatus::DeviceLocked,
            22 => BfStatus::InternalError,
            23 => BfStatus::TableNotFound,
            24 => BfStatus::InUse,
            25 => BfStatus::NotImplemented,
            other => BfStatus::Other(other),
        }
    }

    /// Returns the raw `bf_status_t` value.
    pub const fn as_raw(self) -> i32 {
        match self {
            BfStatus::Success => 0,
            BfStatus::NotReady => 1,
            BfStatus::NoSysResources => 2,
            BfStatus::InvalidArg => 3,
            BfStatus::AlreadyExists => 4,
            BfStatus::HwCommFail => 5,
            BfStatus::ObjectNotFound => 6,
            BfStatus::MaxSessionsExceeded => 7,
            BfStatus::SessionNotFound => 8,
            BfStatus::NoSpace => 9,
            BfStatus::Eagain => 10,
            BfStatus::InitError => 11,
            BfStatus::TxnNotSupported => 12,
            BfStatus::TableLocked => 13,
            BfStatus::Io => 14,
            BfStatus::Unexpected => 15,
            BfStatus::EntryReferencesExist => 16,
            BfStatus::NotSupported => 17,
            BfStatus::HwUpdateFailed => 18,
            BfStatus::NoLearnClients => 19,
            BfStatus::IdleUpdateInProgress => 20,
            BfStatus::DeviceLocked => 21,
            BfStatus::InternalError => 22,
            BfStatus::TableNotFound => 23,
            BfStatus::InUse => 24,
            BfStatus::NotImplemented => 25,
            BfStatus::Other(raw) => raw,
        }
    }

    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        self.as_raw() == 0
    }

    /// Returns true if the status indicates an error.
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Converts to a Result, returning Ok(()) for success.
    ///
    /// The error side is the status itself: callback results are opaque to
    /// the device manager and must survive the round trip unchanged.
    pub fn into_result(self) -> PalResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for BfStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BfStatus::Success => "BF_SUCCESS",
            BfStatus::NotReady => "BF_NOT_READY",
            BfStatus::NoSysResources => "BF_NO_SYS_RESOURCES",
            BfStatus::InvalidArg => "BF_INVALID_ARG",
            BfStatus::AlreadyExists => "BF_ALREADY_EXISTS",
            BfStatus::HwCommFail => "BF_HW_COMM_FAIL",
            BfStatus::ObjectNotFound => "BF_OBJECT_NOT_FOUND",
            BfStatus::MaxSessionsExceeded => "BF_MAX_SESSIONS_EXCEEDED",
            BfStatus::SessionNotFound => "BF_SESSION_NOT_FOUND",
            BfStatus::NoSpace => "BF_NO_SPACE",
            BfStatus::Eagain => "BF_EAGAIN",
            BfStatus::InitError => "BF_INIT_ERROR",
            BfStatus::TxnNotSupported => "BF_TXN_NOT_SUPPORTED",
            BfStatus::TableLocked => "BF_TABLE_LOCKED",
            BfStatus::Io => "BF_IO",
            BfStatus::Unexpected => "BF_UNEXPECTED",
            BfStatus::EntryReferencesExist => "BF_ENTRY_REFERENCES_EXIST",
            BfStatus::NotSupported => "BF_NOT_SUPPORTED",
            BfStatus::HwUpdateFailed => "BF_HW_UPDATE_FAILED",
            BfStatus::NoLearnClients => "BF_NO_LEARN_CLIENTS",
            BfStatus::IdleUpdateInProgress => "BF_IDLE_UPDATE_IN_PROGRESS",
            BfStatus::DeviceLocked => "BF_DEVICE_LOCKED",
            BfStatus::InternalError => "BF_INTERNAL_ERROR",
            BfStatus::TableNotFound => "BF_TABLE_NOT_FOUND",
            BfStatus::InUse => "BF_IN_USE",
            BfStatus::NotImplemented => "BF_NOT_IMPLEMENTED",
            BfStatus::Other(raw) => return write!(f, "BF_STATUS({})", raw),
        };
        write!(f, "{}", s)
    }
}

/// Result type for platform callbacks.
///
/// A callback either produces its value or fails with the exact status the
/// platform reported.
pub type PalResult<T> = Result<T, BfStatus>;

/// Errors raised while binding a platform callback table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PalError {
    /// A mandatory slot in a C callback table was null.
    #[error("Callback slot not set: {slot}")]
    MissingCallback { slot: &'static str },

    /// A platform returned a string that is not valid UTF-8.
    #[error("Invalid UTF-8 from platform callback: {slot}")]
    InvalidUtf8 { slot: &'static str },
}

/// Extension trait for converting raw `bf_status_t` codes.
pub trait BfStatusExt {
    /// Converts a raw status code to a Result.
    fn to_result(self) -> PalResult<()>;
}

impl BfStatusExt for i32 {
    fn to_result(self) -> PalResult<()> {
        BfStatus::from_raw(self).into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_success() {
        assert!(BfStatus::Success.is_success());
        assert!(!BfStatus::Success.is_error());
        assert!(BfStatus::Success.into_result().is_ok());
    }

    #[test]
    fn test_status_failure_is_carried_verbatim() {
        assert!(BfStatus::HwCommFail.is_error());
        assert_eq!(
            BfStatus::HwCommFail.into_result(),
            Err(BfStatus::HwCommFail)
        );
    }

    #[test]
    fn test_status_from_raw() {
        assert_eq!(BfStatus::from_raw(0), BfStatus::Success);
        assert_eq!(BfStatus::from_raw(3), BfStatus::InvalidArg);
        assert_eq!(BfStatus::from_raw(25), BfStatus::NotImplemented);
        assert_eq!(BfStatus::from_raw(15), BfStatus::Unexpected);
        assert_eq!(BfStatus::from_raw(-1), BfStatus::Other(-1));
        assert_eq!(BfStatus::from_raw(999), BfStatus::Other(999));
    }

    #[test]
    fn test_status_raw_values_are_stable() {
        for raw in -3..=40 {
            assert_eq!(BfStatus::from_raw(raw).as_raw(), raw);
        }
    }

    #[test]
    fn test_raw_status_to_result() {
        assert!(0_i32.to_result().is_ok());
        assert_eq!(6_i32.to_result(), Err(BfStatus::ObjectNotFound));
        assert_eq!(77_i32.to_result(), Err(BfStatus::Other(77)));
        assert_eq!((-5_i32).to_result().unwrap_err().as_raw(), -5);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(BfStatus::Success.to_string(), "BF_SUCCESS");
        assert_eq!(BfStatus::InvalidArg.to_string(), "BF_INVALID_ARG");
        assert_eq!(BfStatus::HwUpdateFailed.to_string(), "BF_HW_UPDATE_FAILED");
        assert_eq!(BfStatus::Other(77).to_string(), "BF_STATUS(77)");
    }

    #[test]
    fn test_pal_error_display() {
        let err = PalError::MissingCallback {
            slot: "warm_init_end",
        };
        assert_eq!(err.to_string(), "Callback slot not set: warm_init_end");
    }
}
