//! Per-entry-point failure conventions of the vendor library.
//!
//! Every `spinapi` function returns an `int`, but the library does not agree with itself
//! on what a failing value looks like: some functions return `0` on success and any other
//! value on failure, others return a meaningful non-negative value (an instruction address,
//! a board count) and only negative values mean failure. A few codes are never checked.
//!
//! The table lives in [`EntryPoint::policy`] so the convention of each function is stated
//! once, next to its symbol name, instead of at every call site.

use std::fmt;

use indexmap::IndexMap;

/// How the return code of a native call is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// `0` is success, anything else is failure.
    NonZero,
    /// Negative values are failure, non-negative values are results.
    Negative,
    /// The code is never treated as failure.
    Unchecked,
}

impl FailurePolicy {
    pub fn is_failure(self, code: i32) -> bool {
        match self {
            FailurePolicy::NonZero => code != 0,
            FailurePolicy::Negative => code < 0,
            FailurePolicy::Unchecked => false,
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                FailurePolicy::NonZero => "nonzero-fails",
                FailurePolicy::Negative => "negative-fails",
                FailurePolicy::Unchecked => "unchecked",
            }
        )
    }
}

/// The native functions this binding calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    GetError,
    GetVersion,
    GetFirmwareId,
    StatusMessage,
    ReadStatus,
    CountBoards,
    SelectBoard,
    Init,
    SetDebug,
    CoreClock,
    StartProgramming,
    StopProgramming,
    SelectDds,
    SetFreq,
    SetPhase,
    SetAmp,
    InstDds2,
    Start,
    Stop,
    Reset,
    Close,
    WriteRegister,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 22] = [
        EntryPoint::GetError,
        EntryPoint::GetVersion,
        EntryPoint::GetFirmwareId,
        EntryPoint::StatusMessage,
        EntryPoint::ReadStatus,
        EntryPoint::CountBoards,
        EntryPoint::SelectBoard,
        EntryPoint::Init,
        EntryPoint::SetDebug,
        EntryPoint::CoreClock,
        EntryPoint::StartProgramming,
        EntryPoint::StopProgramming,
        EntryPoint::SelectDds,
        EntryPoint::SetFreq,
        EntryPoint::SetPhase,
        EntryPoint::SetAmp,
        EntryPoint::InstDds2,
        EntryPoint::Start,
        EntryPoint::Stop,
        EntryPoint::Reset,
        EntryPoint::Close,
        EntryPoint::WriteRegister,
    ];

    /// Exported symbol name in the shared library.
    pub fn symbol(self) -> &'static str {
        match self {
            EntryPoint::GetError => "pb_get_error",
            EntryPoint::GetVersion => "spinpts_get_version",
            EntryPoint::GetFirmwareId => "pb_get_firmware_id",
            EntryPoint::StatusMessage => "pb_status_message",
            EntryPoint::ReadStatus => "pb_read_status",
            EntryPoint::CountBoards => "pb_count_boards",
            EntryPoint::SelectBoard => "pb_select_board",
            EntryPoint::Init => "pb_init",
            EntryPoint::SetDebug => "pb_set_debug",
            EntryPoint::CoreClock => "pb_core_clock",
            EntryPoint::StartProgramming => "pb_start_programming",
            EntryPoint::StopProgramming => "pb_stop_programming",
            EntryPoint::SelectDds => "pb_select_dds",
            EntryPoint::SetFreq => "pb_set_freq",
            EntryPoint::SetPhase => "pb_set_phase",
            EntryPoint::SetAmp => "pb_set_amp",
            EntryPoint::InstDds2 => "pb_inst_dds2",
            EntryPoint::Start => "pb_start",
            EntryPoint::Stop => "pb_stop",
            EntryPoint::Reset => "pb_reset",
            EntryPoint::Close => "pb_close",
            EntryPoint::WriteRegister => "pb_write_register",
        }
    }

    /// Failure convention of the entry point.
    ///
    /// `pb_core_clock` is deliberately [`FailurePolicy::Unchecked`]: its return code has
    /// never been checked by the binding and callers rely on a clock call that does not
    /// raise. Accessors returning strings or words have no status code at all.
    pub fn policy(self) -> FailurePolicy {
        match self {
            EntryPoint::Init
            | EntryPoint::StartProgramming
            | EntryPoint::StopProgramming
            | EntryPoint::Start
            | EntryPoint::Stop
            | EntryPoint::Reset
            | EntryPoint::Close => FailurePolicy::NonZero,

            EntryPoint::CountBoards
            | EntryPoint::SelectBoard
            | EntryPoint::SelectDds
            | EntryPoint::SetFreq
            | EntryPoint::SetPhase
            | EntryPoint::SetAmp
            | EntryPoint::InstDds2 => FailurePolicy::Negative,

            EntryPoint::CoreClock
            | EntryPoint::WriteRegister
            | EntryPoint::SetDebug
            | EntryPoint::GetError
            | EntryPoint::GetVersion
            | EntryPoint::GetFirmwareId
            | EntryPoint::StatusMessage
            | EntryPoint::ReadStatus => FailurePolicy::Unchecked,
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// The whole symbol-to-policy table, in declaration order.
///
/// ```
/// use pbinstr_backend::policy::*;
///
/// let table = policy_table();
/// assert_eq!(table["pb_init"], FailurePolicy::NonZero);
/// assert_eq!(table["pb_inst_dds2"], FailurePolicy::Negative);
/// assert_eq!(table["pb_core_clock"], FailurePolicy::Unchecked);
/// ```
pub fn policy_table() -> IndexMap<&'static str, FailurePolicy> {
    EntryPoint::ALL
        .iter()
        .map(|entry| (entry.symbol(), entry.policy()))
        .collect()
}
