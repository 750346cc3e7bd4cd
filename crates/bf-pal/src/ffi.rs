//! C ABI for platform callback tables.
//!
//! Platforms written in C register a [`RawDevCallbacks`] table of nullable
//! function pointers, laid out like `bf_pal_dev_callbacks_t`. The table is
//! validated once and wrapped in [`FfiDevCallbacks`], which implements
//! [`DevCallbacks`] so the device manager sees C and Rust platforms alike.
//!
//! # Safety
//!
//! Callback results, out-parameters and caller-owned buffers follow the C
//! conventions: every slot returns a raw `bf_status_t`, strings are written
//! into buffers owned by this module, sized by the caller's `name_size`, and
//! are read back up to the first NUL.

use crate::callbacks::{CallbackSlot, DevCallbacks};
use crate::status::{BfStatus, BfStatusExt, PalError, PalResult};
use crate::types::{DevId, DevInitMode, DeviceProfile, SerdesUpgradeMode};
use std::ffi::{c_char, c_int, CString};
use std::fmt;
use std::ptr;

/// Maximum number of P4 programs in a C device profile.
pub const MAX_P4_PROGRAMS: usize = 8;

/// Conventional netdev name buffer size used by `bf_pal` callers.
pub const CPUIF_NETDEV_NAME_LEN: usize = 128;

/// C view of a device profile passed to the `device_add` slot.
///
/// Program name pointers are only valid for the duration of the call.
#[repr(C)]
#[derive(Debug)]
pub struct RawDeviceProfile {
    pub num_p4_programs: u8,
    pub p4_program_names: [*const c_char; MAX_P4_PROGRAMS],
    pub coal_mirror_enable: bool,
}

pub type WarmInitBeginFn =
    unsafe extern "C" fn(dev_id: DevId, mode: c_int, serdes_upgrade_mode: c_int, upgrade_agents: bool) -> c_int;
pub type DeviceAddFn = unsafe extern "C" fn(dev_id: DevId, profile: *mut RawDeviceProfile) -> c_int;
pub type WarmInitEndFn = unsafe extern "C" fn(dev_id: DevId) -> c_int;
pub type CpuifNetdevNameGetFn =
    unsafe extern "C" fn(dev_id: DevId, name: *mut c_char, name_size: usize) -> c_int;
pub type Cpuif10gNetdevNameGetFn = unsafe extern "C" fn(
    dev_id: DevId,
    pci_bus_dev: *mut c_char,
    instance: c_int,
    name: *mut c_char,
    name_size: usize,
) -> c_int;
pub type PltfmTypeGetFn = unsafe extern "C" fn(dev_id: DevId, is_sw_model: *mut bool) -> c_int;
pub type ResetConfigFn = unsafe extern "C" fn(dev_id: DevId) -> c_int;
pub type WarmInitErrorSetFn = unsafe extern "C" fn(dev_id: DevId, state: bool) -> c_int;
pub type WarmInitErrorGetFn = unsafe extern "C" fn(dev_id: DevId, state: *mut bool) -> c_int;

/// C-compatible callback table (matches `bf_pal_dev_callbacks_t`).
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct RawDevCallbacks {
    pub warm_init_begin: Option<WarmInitBeginFn>,
    pub device_add: Option<DeviceAddFn>,
    pub warm_init_end: Option<WarmInitEndFn>,
    pub cpuif_netdev_name_get: Option<CpuifNetdevNameGetFn>,
    pub cpuif_10g_netdev_name_get: Option<Cpuif10gNetdevNameGetFn>,
    pub pltfm_type_get: Option<PltfmTypeGetFn>,
    pub reset_config: Option<ResetConfigFn>,
    pub warm_init_error_set: Option<WarmInitErrorSetFn>,
    pub warm_init_error_get: Option<WarmInitErrorGetFn>,
}

impl RawDevCallbacks {
    fn is_set(&self, slot: CallbackSlot) -> bool {
        match slot {
            CallbackSlot::WarmInitBegin => self.warm_init_begin.is_some(),
            CallbackSlot::DeviceAdd => self.device_add.is_some(),
            CallbackSlot::WarmInitEnd => self.warm_init_end.is_some(),
            CallbackSlot::CpuifNetdevNameGet => self.cpuif_netdev_name_get.is_some(),
            CallbackSlot::Cpuif10gNetdevNameGet => self.cpuif_10g_netdev_name_get.is_some(),
            CallbackSlot::PltfmTypeGet => self.pltfm_type_get.is_some(),
            CallbackSlot::ResetConfig => self.reset_config.is_some(),
            CallbackSlot::WarmInitErrorSet => self.warm_init_error_set.is_some(),
            CallbackSlot::WarmInitErrorGet => self.warm_init_error_get.is_some(),
        }
    }

    /// Returns the slots that are null, in table order.
    pub fn missing_slots(&self) -> Vec<CallbackSlot> {
        CallbackSlot::ALL
            .iter()
            .copied()
            .filter(|slot| !self.is_set(*slot))
            .collect()
    }
}

impl fmt::Debug for RawDevCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("RawDevCallbacks");
        for slot in CallbackSlot::ALL {
            dbg.field(slot.as_str(), &self.is_set(slot));
        }
        dbg.finish()
    }
}

fn missing(slot: CallbackSlot) -> PalError {
    PalError::MissingCallback {
        slot: slot.as_str(),
    }
}

/// A validated C callback table.
#[derive(Clone, Copy)]
pub struct FfiDevCallbacks {
    warm_init_begin: WarmInitBeginFn,
    device_add: DeviceAddFn,
    warm_init_end: WarmInitEndFn,
    cpuif_netdev_name_get: CpuifNetdevNameGetFn,
    cpuif_10g_netdev_name_get: Cpuif10gNetdevNameGetFn,
    pltfm_type_get: PltfmTypeGetFn,
    reset_config: ResetConfigFn,
    warm_init_error_set: WarmInitErrorSetFn,
    warm_init_error_get: WarmInitErrorGetFn,
}

impl FfiDevCallbacks {
    /// Validates a C table. Every slot is mandatory.
    ///
    /// # Safety
    ///
    /// Every function pointer in `raw` must stay valid for the lifetime of
    /// the returned value, follow the `bf_pal` calling conventions and be
    /// safe to call from any thread.
    pub unsafe fn from_raw(raw: &RawDevCallbacks) -> Result<Self, PalError> {
        Ok(Self {
            warm_init_begin: raw
                .warm_init_begin
                .ok_or_else(|| missing(CallbackSlot::WarmInitBegin))?,
            device_add: raw
                .device_add
                .ok_or_else(|| missing(CallbackSlot::DeviceAdd))?,
            warm_init_end: raw
                .warm_init_end
                .ok_or_else(|| missing(CallbackSlot::WarmInitEnd))?,
            cpuif_netdev_name_get: raw
                .cpuif_netdev_name_get
                .ok_or_else(|| missing(CallbackSlot::CpuifNetdevNameGet))?,
            cpuif_10g_netdev_name_get: raw
                .cpuif_10g_netdev_name_get
                .ok_or_else(|| missing(CallbackSlot::Cpuif10gNetdevNameGet))?,
            pltfm_type_get: raw
                .pltfm_type_get
                .ok_or_else(|| missing(CallbackSlot::PltfmTypeGet))?,
            reset_config: raw
                .reset_config
                .ok_or_else(|| missing(CallbackSlot::ResetConfig))?,
            warm_init_error_set: raw
                .warm_init_error_set
                .ok_or_else(|| missing(CallbackSlot::WarmInitErrorSet))?,
            warm_init_error_get: raw
                .warm_init_error_get
                .ok_or_else(|| missing(CallbackSlot::WarmInitErrorGet))?,
        })
    }
}

impl fmt::Debug for FfiDevCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfiDevCallbacks").finish_non_exhaustive()
    }
}

/// Zeroed name buffer of `name_size` bytes. A zero size still gets one byte
/// so the slot always receives a valid pointer.
fn name_buffer(name_size: usize) -> Vec<c_char> {
    vec![0; name_size.max(1)]
}

/// Reads a NUL-terminated name written by a C slot.
fn read_name(buf: &[c_char], slot: CallbackSlot) -> PalResult<String> {
    let bytes: Vec<u8> = buf
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();

    String::from_utf8(bytes).map_err(|_| {
        log::warn!("{}: platform returned a non UTF-8 netdev name", slot);
        BfStatus::Unexpected
    })
}

// SAFETY (all slot calls below): pointer validity and thread safety of the
// slots is guaranteed by the caller of `FfiDevCallbacks::from_raw`; every
// pointer argument refers to memory owned by the calling frame and outlives
// the call.
impl DevCallbacks for FfiDevCallbacks {
    fn warm_init_begin(
        &self,
        dev_id: DevId,
        mode: DevInitMode,
        serdes_upgrade_mode: SerdesUpgradeMode,
        upgrade_agents: bool,
    ) -> PalResult<()> {
        let status = unsafe {
            (self.warm_init_begin)(
                dev_id,
                mode.as_raw(),
                serdes_upgrade_mode.as_raw(),
                upgrade_agents,
            )
        };
        status.to_result()
    }

    fn device_add(&self, dev_id: DevId, profile: &DeviceProfile) -> PalResult<()> {
        if profile.programs.len() > MAX_P4_PROGRAMS {
            log::warn!(
                "device_add: dev {} profile has {} programs, C table supports {}",
                dev_id,
                profile.programs.len(),
                MAX_P4_PROGRAMS
            );
            return Err(BfStatus::InvalidArg);
        }

        let names = profile
            .programs
            .iter()
            .map(|p| CString::new(p.name.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| BfStatus::InvalidArg)?;

        let mut raw = RawDeviceProfile {
            num_p4_programs: names.len() as u8,
            p4_program_names: [ptr::null(); MAX_P4_PROGRAMS],
            coal_mirror_enable: profile.coal_mirror_enable,
        };
        for (slot, name) in raw.p4_program_names.iter_mut().zip(&names) {
            *slot = name.as_ptr();
        }

        let status = unsafe { (self.device_add)(dev_id, &mut raw) };
        status.to_result()
    }

    fn warm_init_end(&self, dev_id: DevId) -> PalResult<()> {
        let status = unsafe { (self.warm_init_end)(dev_id) };
        status.to_result()
    }

    fn cpuif_netdev_name_get(&self, dev_id: DevId, name_size: usize) -> PalResult<String> {
        let mut buf = name_buffer(name_size);
        let status = unsafe { (self.cpuif_netdev_name_get)(dev_id, buf.as_mut_ptr(), name_size) };
        status.to_result()?;
        read_name(&buf, CallbackSlot::CpuifNetdevNameGet)
    }

    fn cpuif_10g_netdev_name_get(
        &self,
        dev_id: DevId,
        pci_bus_dev: &str,
        instance: i32,
        name_size: usize,
    ) -> PalResult<String> {
        let mut bus = CString::new(pci_bus_dev)
            .map_err(|_| BfStatus::InvalidArg)?
            .into_bytes_with_nul();
        let mut buf = name_buffer(name_size);
        let status = unsafe {
            (self.cpuif_10g_netdev_name_get)(
                dev_id,
                bus.as_mut_ptr().cast::<c_char>(),
                instance,
                buf.as_mut_ptr(),
                name_size,
            )
        };
        status.to_result()?;
        read_name(&buf, CallbackSlot::Cpuif10gNetdevNameGet)
    }

    fn pltfm_type_get(&self, dev_id: DevId) -> PalResult<bool> {
        let mut is_sw_model = false;
        let status = unsafe { (self.pltfm_type_get)(dev_id, &mut is_sw_model) };
        status.to_result()?;
        Ok(is_sw_model)
    }

    fn reset_config(&self, dev_id: DevId) -> PalResult<()> {
        let status = unsafe { (self.reset_config)(dev_id) };
        status.to_result()
    }

    fn warm_init_error_set(&self, dev_id: DevId, state: bool) -> PalResult<()> {
        let status = unsafe { (self.warm_init_error_set)(dev_id, state) };
        status.to_result()
    }

    fn warm_init_error_get(&self, dev_id: DevId) -> PalResult<bool> {
        let mut state = false;
        let status = unsafe { (self.warm_init_error_get)(dev_id, &mut state) };
        status.to_result()?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::ffi::CStr;

    thread_local! {
        static LAST_BEGIN: Cell<(DevId, c_int, c_int, bool)> = const { Cell::new((-1, -1, -1, false)) };
        static LAST_PROGRAMS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
        static LAST_BUS: RefCell<String> = const { RefCell::new(String::new()) };
        static ERROR_STATE: Cell<bool> = const { Cell::new(false) };
        static NETDEV_NAME: RefCell<String> = RefCell::new("bf_pci0".to_string());
    }

    unsafe extern "C" fn begin(dev_id: DevId, mode: c_int, serdes: c_int, agents: bool) -> c_int {
        LAST_BEGIN.with(|c| c.set((dev_id, mode, serdes, agents)));
        0
    }

    unsafe extern "C" fn add(_dev_id: DevId, profile: *mut RawDeviceProfile) -> c_int {
        let profile = &*profile;
        let names = profile.p4_program_names[..profile.num_p4_programs as usize]
            .iter()
            .map(|p| CStr::from_ptr(*p).to_string_lossy().into_owned())
            .collect();
        LAST_PROGRAMS.with(|c| *c.borrow_mut() = names);
        0
    }

    unsafe extern "C" fn end(_dev_id: DevId) -> c_int {
        BfStatus::HwUpdateFailed.as_raw()
    }

    unsafe fn write_name(name: &[u8], buf: *mut c_char, size: usize) -> c_int {
        if name.len() + 1 > size {
            return BfStatus::NoSpace.as_raw();
        }
        ptr::copy_nonoverlapping(name.as_ptr().cast::<c_char>(), buf, name.len());
        *buf.add(name.len()) = 0;
        0
    }

    unsafe extern "C" fn netdev(_dev_id: DevId, buf: *mut c_char, size: usize) -> c_int {
        let name = NETDEV_NAME.with(|c| c.borrow().clone());
        write_name(name.as_bytes(), buf, size)
    }

    unsafe extern "C" fn netdev_10g(
        _dev_id: DevId,
        bus: *mut c_char,
        instance: c_int,
        buf: *mut c_char,
        size: usize,
    ) -> c_int {
        LAST_BUS.with(|c| *c.borrow_mut() = CStr::from_ptr(bus).to_string_lossy().into_owned());
        let name = format!("enp4s0f{}", instance);
        write_name(name.as_bytes(), buf, size)
    }

    unsafe extern "C" fn pltfm_type(_dev_id: DevId, is_sw_model: *mut bool) -> c_int {
        *is_sw_model = true;
        0
    }

    unsafe extern "C" fn reset(dev_id: DevId) -> c_int {
        if dev_id == 0 {
            0
        } else {
            BfStatus::InvalidArg.as_raw()
        }
    }

    unsafe extern "C" fn error_set(_dev_id: DevId, state: bool) -> c_int {
        ERROR_STATE.with(|c| c.set(state));
        0
    }

    unsafe extern "C" fn error_get(_dev_id: DevId, state: *mut bool) -> c_int {
        *state = ERROR_STATE.with(|c| c.get());
        0
    }

    fn full_table() -> RawDevCallbacks {
        RawDevCallbacks {
            warm_init_begin: Some(begin),
            device_add: Some(add),
            warm_init_end: Some(end),
            cpuif_netdev_name_get: Some(netdev),
            cpuif_10g_netdev_name_get: Some(netdev_10g),
            pltfm_type_get: Some(pltfm_type),
            reset_config: Some(reset),
            warm_init_error_set: Some(error_set),
            warm_init_error_get: Some(error_get),
        }
    }

    #[test]
    fn test_default_table_is_all_null() {
        let raw = RawDevCallbacks::default();
        assert_eq!(raw.missing_slots(), CallbackSlot::ALL.to_vec());
    }

    #[test]
    fn test_missing_slot_rejected() {
        let mut raw = full_table();
        raw.warm_init_end = None;

        assert_eq!(raw.missing_slots(), vec![CallbackSlot::WarmInitEnd]);
        let err = unsafe { FfiDevCallbacks::from_raw(&raw) }.unwrap_err();
        assert_eq!(
            err,
            PalError::MissingCallback {
                slot: "warm_init_end"
            }
        );
    }

    #[test]
    fn test_warm_init_begin_passes_raw_modes() {
        let cb = unsafe { FfiDevCallbacks::from_raw(&full_table()) }.unwrap();
        cb.warm_init_begin(
            3,
            DevInitMode::Hitless,
            SerdesUpgradeMode::DeferredPortReconfig,
            true,
        )
        .unwrap();
        assert_eq!(LAST_BEGIN.with(|c| c.get()), (3, 2, 2, true));
    }

    #[test]
    fn test_device_add_marshals_program_names() {
        let cb = unsafe { FfiDevCallbacks::from_raw(&full_table()) }.unwrap();
        let mut profile = DeviceProfile::with_program("switch");
        profile.programs.push(profile.programs[0].clone());
        profile.programs[1].name = "tna_exact_match".to_string();

        cb.device_add(0, &profile).unwrap();
        assert_eq!(
            LAST_PROGRAMS.with(|c| c.borrow().clone()),
            vec!["switch".to_string(), "tna_exact_match".to_string()]
        );
    }

    #[test]
    fn test_device_add_rejects_oversized_profile() {
        let cb = unsafe { FfiDevCallbacks::from_raw(&full_table()) }.unwrap();
        let mut profile = DeviceProfile::with_program("p");
        profile.programs = vec![profile.programs[0].clone(); MAX_P4_PROGRAMS + 1];
        assert_eq!(cb.device_add(0, &profile), Err(BfStatus::InvalidArg));
    }

    #[test]
    fn test_failure_status_is_verbatim() {
        let cb = unsafe { FfiDevCallbacks::from_raw(&full_table()) }.unwrap();
        assert_eq!(cb.warm_init_end(0), Err(BfStatus::HwUpdateFailed));
        assert_eq!(cb.reset_config(1), Err(BfStatus::InvalidArg));
        assert!(cb.reset_config(0).is_ok());
    }

    #[test]
    fn test_netdev_names() {
        let cb = unsafe { FfiDevCallbacks::from_raw(&full_table()) }.unwrap();
        assert_eq!(
            cb.cpuif_netdev_name_get(0, CPUIF_NETDEV_NAME_LEN).unwrap(),
            "bf_pci0"
        );
        assert_eq!(
            cb.cpuif_10g_netdev_name_get(0, "0000:04:00", 1, CPUIF_NETDEV_NAME_LEN)
                .unwrap(),
            "enp4s0f1"
        );
        assert_eq!(LAST_BUS.with(|c| c.borrow().clone()), "0000:04:00");
    }

    #[test]
    fn test_netdev_buffer_follows_name_size() {
        let cb = unsafe { FfiDevCallbacks::from_raw(&full_table()) }.unwrap();
        let long = "n".repeat(200);
        NETDEV_NAME.with(|c| *c.borrow_mut() = long.clone());

        assert_eq!(cb.cpuif_netdev_name_get(0, 256).unwrap(), long);
        assert_eq!(cb.cpuif_netdev_name_get(0, 200), Err(BfStatus::NoSpace));
        assert_eq!(cb.cpuif_netdev_name_get(0, 0), Err(BfStatus::NoSpace));

        // "enp4s0f7" plus NUL is nine bytes.
        assert_eq!(
            cb.cpuif_10g_netdev_name_get(0, "0000:04:00", 7, 9).unwrap(),
            "enp4s0f7"
        );
        assert_eq!(
            cb.cpuif_10g_netdev_name_get(0, "0000:04:00", 7, 8),
            Err(BfStatus::NoSpace)
        );
    }

    #[test]
    fn test_unknown_status_is_verbatim() {
        unsafe extern "C" fn reset_77(_dev_id: DevId) -> c_int {
            77
        }
        let mut raw = full_table();
        raw.reset_config = Some(reset_77);
        let cb = unsafe { FfiDevCallbacks::from_raw(&raw) }.unwrap();

        let err = cb.reset_config(0).unwrap_err();
        assert_eq!(err, BfStatus::Other(77));
        assert_eq!(err.as_raw(), 77);
    }

    #[test]
    fn test_out_parameters() {
        let cb = unsafe { FfiDevCallbacks::from_raw(&full_table()) }.unwrap();
        assert!(cb.pltfm_type_get(0).unwrap());

        cb.warm_init_error_set(0, true).unwrap();
        assert!(cb.warm_init_error_get(0).unwrap());
        cb.warm_init_error_set(0, false).unwrap();
        assert!(!cb.warm_init_error_get(0).unwrap());
    }
}
