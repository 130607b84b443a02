//! The [`PulseBlaster`] board handle.
//!
//! ## Overview
//!
//! A [`PulseBlaster`] owns the (lazily loaded) spinapi library and exposes one method per
//! vendor function, plus the register-programming helpers. Every method goes through
//! [`PulseBlaster::call`], which:
//! 1. loads the library on first use (once; later calls reuse it),
//! 2. invokes the entry point,
//! 3. judges the return code with the entry point's [`FailurePolicy`],
//! 4. on failure, asks `pb_get_error` for the library's message and returns
//!    [`SpinError::Native`].
//!
//! The vendor library keeps the selected board as process state: after
//! [`PulseBlaster::select_board`] every call acts on that board. Keep a single handle per
//! process and do not share it between threads without external locking.
//!
//! ## Usage
//!
//! ```ignore
//! # use pbctrl_backend::*;
//! let mut pb = PulseBlaster::from_env();
//! pb.init()?;
//! pb.core_clock(75.0)?;
//! pb.start_programming(ProgramTarget::PulseProgram)?;
//! let start = pb.inst("111111111111", Opcode::Continue, 0, 100.0 * units::US)?;
//! pb.inst("000000000000", Opcode::Branch, start, 100.0 * units::US)?;
//! pb.stop_programming()?;
//! pb.start()?;
//! ```

use tracing::{debug, error, warn};

use pbinstr_backend::{
    BoardStatus, DdsInstruction, EntryPoint, FailurePolicy, Flags, Instruction, Opcode,
    ProgramTarget, RawInstructionDds2,
};

use crate::error::{Result, SpinError};
use crate::loader::{Loader, NativeLoader};
use crate::spinapi::{CInt32, SpinApi, DEFAULT_FLAGS_REGISTER};

/// Register indices programmed by the `program_*_regs` helpers.
///
/// A single value yields [`Registers::Single`] with index `0`; any other count yields the
/// sequence `0..n` in [`Registers::Many`]. Callers written against the single-value shape
/// rely on this asymmetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registers {
    Single(usize),
    Many(Vec<usize>),
}

impl Registers {
    pub fn for_count(count: usize) -> Self {
        if count == 1 {
            Registers::Single(0)
        } else {
            Registers::Many((0..count).collect())
        }
    }

    pub fn indices(&self) -> Vec<usize> {
        match self {
            Registers::Single(index) => vec![*index],
            Registers::Many(indices) => indices.clone(),
        }
    }
}

/// Handle to the spinapi library and the board it currently addresses.
pub struct PulseBlaster<L: Loader = NativeLoader> {
    loader: L,
    api: Option<Box<dyn SpinApi + Send>>,
    selected_board: Option<i32>,
}

impl PulseBlaster<NativeLoader> {
    /// Handle for the vendor library found through the `SPINAPI_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(NativeLoader::from_env())
    }
}

impl<L: Loader> PulseBlaster<L> {
    /// Creates the handle. Nothing is loaded until the first call.
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            api: None,
            selected_board: None,
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn is_loaded(&self) -> bool {
        self.api.is_some()
    }

    /// Board index passed to the last successful [`PulseBlaster::select_board`].
    pub fn selected_board(&self) -> Option<i32> {
        self.selected_board
    }

    /// Loads the library if needed and returns it.
    ///
    /// Idempotent: the loader runs at most once per handle, unless it failed. A failing
    /// initial `pb_set_debug` is logged and does not discard the library.
    pub fn api(&mut self) -> Result<&(dyn SpinApi + Send)> {
        let api = match self.api.take() {
            Some(api) => api,
            None => self.load_api()?,
        };
        Ok(&**self.api.insert(api))
    }

    fn load_api(&self) -> Result<Box<dyn SpinApi + Send>> {
        let api = self.loader.load()?;
        if let Some(debug_mode) = self.loader.debug_on_load() {
            match api.pb_set_debug(debug_mode as CInt32) {
                Ok(code) => debug!(enabled = debug_mode, code, "initial pb_set_debug"),
                Err(err) => warn!(enabled = debug_mode, %err, "initial pb_set_debug failed"),
            }
        }
        debug!("spinapi loaded");
        Ok(api)
    }

    /// Invokes a native entry point and applies its failure policy.
    ///
    /// On failure the message currently reported by `pb_get_error` is returned in
    /// [`SpinError::Native`]. Codes of [`FailurePolicy::Unchecked`] entry points are returned
    /// as is, a non-zero one is logged at warn level.
    pub fn call<F>(&mut self, entry: EntryPoint, func: F) -> Result<CInt32>
    where
        F: FnOnce(&(dyn SpinApi + Send)) -> Result<CInt32>,
    {
        let api = self.api()?;
        let code = func(api)?;
        debug!(symbol = entry.symbol(), code, "spinapi call");

        let policy = entry.policy();
        if policy.is_failure(code) {
            let message = api.pb_get_error()?;
            error!(symbol = entry.symbol(), code, %message, "spinapi call failed");
            return Err(SpinError::Native {
                symbol: entry.symbol(),
                code,
                message,
            });
        }
        if policy == FailurePolicy::Unchecked && code != 0 {
            warn!(symbol = entry.symbol(), code, "ignoring non-zero return code");
        }
        Ok(code)
    }

    // QUERIES
    pub fn get_error(&mut self) -> Result<String> {
        self.api()?.pb_get_error()
    }

    /// Version string of the spinapi library.
    pub fn version(&mut self) -> Result<String> {
        self.api()?.spinpts_get_version()
    }

    pub fn firmware_id(&mut self) -> Result<u32> {
        self.api()?.pb_get_firmware_id()
    }

    /// Human-readable status, e.g. `"Board is running.\n"`.
    pub fn status_message(&mut self) -> Result<String> {
        self.api()?.pb_status_message()
    }

    pub fn read_status(&mut self) -> Result<BoardStatus> {
        let word = self.api()?.pb_read_status()?;
        Ok(BoardStatus::from_raw(word))
    }

    // BOARD
    pub fn count_boards(&mut self) -> Result<i32> {
        self.call(EntryPoint::CountBoards, |api| api.pb_count_boards())
    }

    pub fn select_board(&mut self, board_num: i32) -> Result<()> {
        self.call(EntryPoint::SelectBoard, |api| api.pb_select_board(board_num))?;
        self.selected_board = Some(board_num);
        Ok(())
    }

    pub fn init(&mut self) -> Result<()> {
        self.call(EntryPoint::Init, |api| api.pb_init())?;
        Ok(())
    }

    pub fn set_debug(&mut self, debug_mode: bool) -> Result<()> {
        self.call(EntryPoint::SetDebug, |api| api.pb_set_debug(debug_mode as CInt32))?;
        Ok(())
    }

    /// Tells the library the board's core clock frequency, in MHz.
    ///
    /// The return code of `pb_core_clock` is not checked and this never reports a native
    /// failure. Callers expecting a bad clock value to raise will not see one.
    pub fn core_clock(&mut self, clock_freq: f64) -> Result<()> {
        self.call(EntryPoint::CoreClock, |api| api.pb_core_clock(clock_freq))?;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.call(EntryPoint::Start, |api| api.pb_start())?;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.call(EntryPoint::Stop, |api| api.pb_stop())?;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.call(EntryPoint::Reset, |api| api.pb_reset())?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.call(EntryPoint::Close, |api| api.pb_close())?;
        Ok(())
    }

    /// Raw register write. The return code is not checked.
    pub fn write_register(&mut self, address: i32, value: i32) -> Result<i32> {
        self.call(EntryPoint::WriteRegister, |api| api.pb_write_register(address, value))
    }

    /// Sets the flag word the board outputs while idle.
    pub fn write_default_flags(&mut self, flags: impl Into<Flags>) -> Result<()> {
        let bits = flags.into().encode()?;
        self.write_register(DEFAULT_FLAGS_REGISTER, bits as i32)?;
        Ok(())
    }

    // PROGRAMMING
    pub fn start_programming(&mut self, target: ProgramTarget) -> Result<()> {
        self.call(EntryPoint::StartProgramming, |api| api.pb_start_programming(target.code()))?;
        Ok(())
    }

    pub fn stop_programming(&mut self) -> Result<()> {
        self.call(EntryPoint::StopProgramming, |api| api.pb_stop_programming())?;
        Ok(())
    }

    pub fn select_dds(&mut self, dds: i32) -> Result<()> {
        self.call(EntryPoint::SelectDds, |api| api.pb_select_dds(dds))?;
        Ok(())
    }

    /// Writes the next frequency register, in MHz. Only valid while programming `FreqRegs`.
    pub fn set_freq(&mut self, freq: f64) -> Result<()> {
        self.call(EntryPoint::SetFreq, |api| api.pb_set_freq(freq))?;
        Ok(())
    }

    /// Writes the next phase register, in degrees. Only valid while programming `PhaseRegs`.
    pub fn set_phase(&mut self, phase: f64) -> Result<()> {
        self.call(EntryPoint::SetPhase, |api| api.pb_set_phase(phase))?;
        Ok(())
    }

    /// Writes amplitude register `register` (amplitude is a fraction of full scale).
    pub fn set_amp(&mut self, amp: f32, register: i32) -> Result<()> {
        self.call(EntryPoint::SetAmp, |api| api.pb_set_amp(amp, register))?;
        Ok(())
    }

    /// Programs one instruction with both DDS channels off and returns its address.
    ///
    /// `flags` is either a bitmask or a string with flag 0 first, see
    /// [`pbinstr_backend::flags`].
    pub fn inst(&mut self, flags: impl Into<Flags>, opcode: Opcode, data: i32, length: f64) -> Result<i32> {
        let raw = Instruction::new(flags, opcode, data, length).encode()?;
        self.inst_raw(&raw)
    }

    /// Programs one instruction including DDS register selection and returns its address.
    pub fn inst_dds2(&mut self, instr: &DdsInstruction) -> Result<i32> {
        let raw = instr.encode()?;
        self.inst_raw(&raw)
    }

    fn inst_raw(&mut self, raw: &RawInstructionDds2) -> Result<i32> {
        self.call(EntryPoint::InstDds2, |api| api.pb_inst_dds2(raw))
    }

    // REGISTER HELPERS
    /// Programs `freqs` (MHz) into frequency registers `0..n`, in order.
    pub fn program_freq_regs(&mut self, freqs: &[f64]) -> Result<Registers> {
        self.start_programming(ProgramTarget::FreqRegs)?;
        for &freq in freqs {
            self.set_freq(freq)?;
        }
        self.stop_programming()?;
        Ok(Registers::for_count(freqs.len()))
    }

    /// Programs `phases` (degrees) into phase registers `0..n`, in order.
    pub fn program_phase_regs(&mut self, phases: &[f64]) -> Result<Registers> {
        self.start_programming(ProgramTarget::PhaseRegs)?;
        for &phase in phases {
            self.set_phase(phase)?;
        }
        self.stop_programming()?;
        Ok(Registers::for_count(phases.len()))
    }

    /// Sets amplitude register `i` to `amps[i]`. No programming mode is entered.
    pub fn program_amp_regs(&mut self, amps: &[f32]) -> Result<Registers> {
        for (register, &amp) in amps.iter().enumerate() {
            self.set_amp(amp, register as i32)?;
        }
        Ok(Registers::for_count(amps.len()))
    }
}
