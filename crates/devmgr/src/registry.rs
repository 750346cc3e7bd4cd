//! Process-wide platform callback table.

use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::error::{DevMgrError, Result};
use crate::{audit_log, debug_log, security_audit, warn_log};
use bf_pal::{CallbackSlot, DevCallbacks, DevId, FfiDevCallbacks, PalResult, RawDevCallbacks};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Holds the platform callback table.
///
/// The table is set at most once. Reads after registration do not lock.
#[derive(Default)]
pub struct CallbackRegistry {
    table: OnceCell<Arc<dyn DevCallbacks>>,
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the platform table. Fails with `AlreadyRegistered` if one is
    /// already set; the existing table stays in place.
    pub fn register(&self, table: Arc<dyn DevCallbacks>) -> Result<()> {
        if self.table.set(table).is_err() {
            return Self::rejected("register");
        }

        audit_log!(AuditRecord::new(
            AuditCategory::CallbackRegistration,
            "CallbackRegistry",
            "register"
        )
        .with_outcome(AuditOutcome::Success));
        Ok(())
    }

    /// Registers a C callback table.
    ///
    /// Every slot must be populated; a table with null slots is rejected
    /// with `InvalidArgument` before anything is stored.
    ///
    /// # Safety
    ///
    /// Every non-null slot must point to a function with the declared
    /// signature that stays valid for the rest of the process.
    pub unsafe fn register_raw(&self, raw: &RawDevCallbacks) -> Result<()> {
        if self.is_registered() {
            return Self::rejected("register_raw");
        }

        let adapter = unsafe { FfiDevCallbacks::from_raw(raw) }.map_err(|e| {
            warn_log!("CallbackRegistry", error = %e, "Rejected incomplete C callback table");
            audit_log!(AuditRecord::new(
                AuditCategory::CallbackRegistration,
                "CallbackRegistry",
                "register_raw"
            )
            .with_details(serde_json::json!({
                "missing_slots": raw
                    .missing_slots()
                    .iter()
                    .map(|slot| slot.as_str())
                    .collect::<Vec<_>>()
            }))
            .with_error(e.to_string()));
            DevMgrError::InvalidArgument(e.to_string())
        })?;

        self.register(Arc::new(adapter))
    }

    fn rejected(action: &'static str) -> Result<()> {
        warn_log!("CallbackRegistry", "Rejected second callback table registration");
        security_audit!(AuditRecord::new(
            AuditCategory::CallbackRegistration,
            "CallbackRegistry",
            action
        )
        .with_denial("callback table already registered"));
        Err(DevMgrError::AlreadyRegistered)
    }

    pub fn is_registered(&self) -> bool {
        self.table.get().is_some()
    }

    /// Returns the registered table or `NotRegistered`.
    pub fn table(&self) -> Result<&Arc<dyn DevCallbacks>> {
        self.table.get().ok_or(DevMgrError::NotRegistered)
    }

    /// Invokes one slot of the registered table.
    ///
    /// A platform failure comes back as `CallbackFailure` carrying the
    /// platform's status unchanged.
    pub fn dispatch<T, F>(&self, slot: CallbackSlot, dev_id: DevId, call: F) -> Result<T>
    where
        F: FnOnce(&dyn DevCallbacks) -> PalResult<T>,
    {
        let table = self.table()?;

        debug_log!("CallbackRegistry", slot = %slot, dev_id = dev_id, "Dispatching platform callback");

        call(table.as_ref()).map_err(|status| {
            warn_log!(
                "CallbackRegistry",
                slot = %slot,
                dev_id = dev_id,
                status = %status,
                "Platform callback failed"
            );
            audit_log!(AuditRecord::new(
                AuditCategory::PlatformCallback,
                "CallbackRegistry",
                slot.as_str()
            )
            .with_dev_id(dev_id)
            .with_error(status.to_string()));
            DevMgrError::CallbackFailure { slot, status }
        })
    }
}
