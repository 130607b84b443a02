//! Provides a minimal rust wrapper for the SpinCore `spinapi` C library.
//!
//! ## Overview
//!
//! The [`SpinApi`] trait mirrors the C entry points this binding uses, one method per
//! exported function, with the exact native argument and return widths. It is the seam
//! between the board handle ([`crate::board::PulseBlaster`]) and the vendor library:
//! - [`NativeLibrary`] implements it on top of a shared library opened with `libloading`.
//! - [`crate::mock::MockSpinApi`] implements it in-process for tests.
//!
//! Methods return the raw status code of the call. Judging that code (and fetching the
//! error message from `pb_get_error`) is the job of the board handle, see
//! [`pbinstr_backend::policy`]. The only error a [`SpinApi`] method reports itself is a
//! symbol missing from the loaded library.
//!
//! ## Safety
//!
//! Symbols are resolved by name on every call and cast to the signature declared here. The
//! declarations follow the vendor header `spinapi.h`; a library exporting a symbol with a
//! different signature is undefined behavior, exactly as with any C binding.
//!
//! ## Constants and Types
//!
//! Type aliases (`CInt32`, `CFloat64`, ...) name the native widths used in every signature.

use std::ffi::CStr;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use tracing::debug;

use pbinstr_backend::{EntryPoint, RawInstructionDds2};

use crate::error::{Result, SpinError};

pub type CConstStr = *const libc::c_char;
pub type CFloat32 = libc::c_float;
pub type CFloat64 = libc::c_double;
pub type CUint32 = libc::c_uint;
pub type CInt32 = libc::c_int;

/// Register holding the flag word output while the board is idle.
pub const DEFAULT_FLAGS_REGISTER: CInt32 = 0x40000 + 0x08;

/// The spinapi entry points used by this binding.
pub trait SpinApi {
    fn pb_get_error(&self) -> Result<String>;
    fn spinpts_get_version(&self) -> Result<String>;
    fn pb_get_firmware_id(&self) -> Result<CUint32>;
    fn pb_status_message(&self) -> Result<String>;
    fn pb_read_status(&self) -> Result<CUint32>;

    fn pb_count_boards(&self) -> Result<CInt32>;
    fn pb_select_board(&self, board_num: CInt32) -> Result<CInt32>;
    fn pb_init(&self) -> Result<CInt32>;
    fn pb_set_debug(&self, debug: CInt32) -> Result<CInt32>;
    fn pb_core_clock(&self, clock_freq: CFloat64) -> Result<CInt32>;

    fn pb_start_programming(&self, device: CInt32) -> Result<CInt32>;
    fn pb_stop_programming(&self) -> Result<CInt32>;
    fn pb_select_dds(&self, dds: CInt32) -> Result<CInt32>;
    fn pb_set_freq(&self, freq: CFloat64) -> Result<CInt32>;
    fn pb_set_phase(&self, phase: CFloat64) -> Result<CInt32>;
    fn pb_set_amp(&self, amp: CFloat32, register: CInt32) -> Result<CInt32>;
    fn pb_inst_dds2(&self, inst: &RawInstructionDds2) -> Result<CInt32>;

    fn pb_start(&self) -> Result<CInt32>;
    fn pb_stop(&self) -> Result<CInt32>;
    fn pb_reset(&self) -> Result<CInt32>;
    fn pb_close(&self) -> Result<CInt32>;
    fn pb_write_register(&self, address: CInt32, value: CInt32) -> Result<CInt32>;
}

type StrFn = unsafe extern "C" fn() -> CConstStr;
type UintFn = unsafe extern "C" fn() -> CUint32;
type IntFn = unsafe extern "C" fn() -> CInt32;
type IntArgFn = unsafe extern "C" fn(CInt32) -> CInt32;
type DoubleArgFn = unsafe extern "C" fn(CFloat64) -> CInt32;
type SetAmpFn = unsafe extern "C" fn(CFloat32, CInt32) -> CInt32;
type WriteRegisterFn = unsafe extern "C" fn(CInt32, CInt32) -> CInt32;
#[rustfmt::skip]
type InstDds2Fn = unsafe extern "C" fn(
    CInt32, CInt32, CInt32, CInt32, CInt32, // freq0, phase0, amp0, dds_en0, phase_reset0
    CInt32, CInt32, CInt32, CInt32, CInt32, // freq1, phase1, amp1, dds_en1, phase_reset1
    CInt32, CInt32, CInt32, CFloat64,       // flags, inst, inst_data, length
) -> CInt32;

/// Copies a C string returned by the library. A null pointer reads as an empty string.
///
/// # Safety
/// `ptr` must be null or point to a nul-terminated string valid for the duration of the call.
unsafe fn string_from_c(ptr: CConstStr) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// A loaded spinapi shared library.
pub struct NativeLibrary {
    lib: Library,
    path: PathBuf,
}

impl NativeLibrary {
    /// Opens the shared library at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "opening spinapi library");
        // SAFETY: loading runs the library's initializers; spinapi has no unsound ones.
        let lib = unsafe { Library::new(path) }.map_err(|source| SpinError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            lib,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves an entry point with the given C signature.
    ///
    /// # Safety
    /// `T` must be the function pointer type matching the exported symbol.
    unsafe fn symbol<T>(&self, entry: EntryPoint) -> Result<Symbol<'_, T>> {
        self.lib
            .get::<T>(entry.symbol().as_bytes())
            .map_err(|source| SpinError::MissingSymbol {
                symbol: entry.symbol(),
                source,
            })
    }

    fn call_str(&self, entry: EntryPoint) -> Result<String> {
        unsafe {
            let func = self.symbol::<StrFn>(entry)?;
            Ok(string_from_c(func()))
        }
    }

    fn call_int(&self, entry: EntryPoint) -> Result<CInt32> {
        unsafe {
            let func = self.symbol::<IntFn>(entry)?;
            Ok(func())
        }
    }

    fn call_int_arg(&self, entry: EntryPoint, arg: CInt32) -> Result<CInt32> {
        unsafe {
            let func = self.symbol::<IntArgFn>(entry)?;
            Ok(func(arg))
        }
    }

    fn call_double_arg(&self, entry: EntryPoint, arg: CFloat64) -> Result<CInt32> {
        unsafe {
            let func = self.symbol::<DoubleArgFn>(entry)?;
            Ok(func(arg))
        }
    }
}

impl SpinApi for NativeLibrary {
    fn pb_get_error(&self) -> Result<String> {
        self.call_str(EntryPoint::GetError)
    }
    fn spinpts_get_version(&self) -> Result<String> {
        self.call_str(EntryPoint::GetVersion)
    }
    fn pb_get_firmware_id(&self) -> Result<CUint32> {
        unsafe {
            let func = self.symbol::<UintFn>(EntryPoint::GetFirmwareId)?;
            Ok(func())
        }
    }
    fn pb_status_message(&self) -> Result<String> {
        self.call_str(EntryPoint::StatusMessage)
    }
    fn pb_read_status(&self) -> Result<CUint32> {
        unsafe {
            let func = self.symbol::<UintFn>(EntryPoint::ReadStatus)?;
            Ok(func())
        }
    }

    fn pb_count_boards(&self) -> Result<CInt32> {
        self.call_int(EntryPoint::CountBoards)
    }
    fn pb_select_board(&self, board_num: CInt32) -> Result<CInt32> {
        self.call_int_arg(EntryPoint::SelectBoard, board_num)
    }
    fn pb_init(&self) -> Result<CInt32> {
        self.call_int(EntryPoint::Init)
    }
    fn pb_set_debug(&self, debug: CInt32) -> Result<CInt32> {
        self.call_int_arg(EntryPoint::SetDebug, debug)
    }
    fn pb_core_clock(&self, clock_freq: CFloat64) -> Result<CInt32> {
        self.call_double_arg(EntryPoint::CoreClock, clock_freq)
    }

    fn pb_start_programming(&self, device: CInt32) -> Result<CInt32> {
        self.call_int_arg(EntryPoint::StartProgramming, device)
    }
    fn pb_stop_programming(&self) -> Result<CInt32> {
        self.call_int(EntryPoint::StopProgramming)
    }
    fn pb_select_dds(&self, dds: CInt32) -> Result<CInt32> {
        self.call_int_arg(EntryPoint::SelectDds, dds)
    }
    fn pb_set_freq(&self, freq: CFloat64) -> Result<CInt32> {
        self.call_double_arg(EntryPoint::SetFreq, freq)
    }
    fn pb_set_phase(&self, phase: CFloat64) -> Result<CInt32> {
        self.call_double_arg(EntryPoint::SetPhase, phase)
    }
    fn pb_set_amp(&self, amp: CFloat32, register: CInt32) -> Result<CInt32> {
        unsafe {
            let func = self.symbol::<SetAmpFn>(EntryPoint::SetAmp)?;
            Ok(func(amp, register))
        }
    }
    fn pb_inst_dds2(&self, inst: &RawInstructionDds2) -> Result<CInt32> {
        unsafe {
            let func = self.symbol::<InstDds2Fn>(EntryPoint::InstDds2)?;
            Ok(func(
                inst.freq0,
                inst.phase0,
                inst.amp0,
                inst.dds_en0,
                inst.phase_reset0,
                inst.freq1,
                inst.phase1,
                inst.amp1,
                inst.dds_en1,
                inst.phase_reset1,
                inst.flags,
                inst.inst,
                inst.inst_data,
                inst.length,
            ))
        }
    }

    fn pb_start(&self) -> Result<CInt32> {
        self.call_int(EntryPoint::Start)
    }
    fn pb_stop(&self) -> Result<CInt32> {
        self.call_int(EntryPoint::Stop)
    }
    fn pb_reset(&self) -> Result<CInt32> {
        self.call_int(EntryPoint::Reset)
    }
    fn pb_close(&self) -> Result<CInt32> {
        self.call_int(EntryPoint::Close)
    }
    fn pb_write_register(&self, address: CInt32, value: CInt32) -> Result<CInt32> {
        unsafe {
            let func = self.symbol::<WriteRegisterFn>(EntryPoint::WriteRegister)?;
            Ok(func(address, value))
        }
    }
}
