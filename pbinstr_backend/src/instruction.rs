//! Instruction-related definitions for the PulseBlaster pulse program.
//!
//! ## Main structures and enumerations
//!
//! - [`Opcode`]: the instruction types understood by the board (`CONTINUE`, `BRANCH`, ...).
//! - [`ProgramTarget`]: which memory `pb_start_programming` opens (pulse program,
//!   frequency registers or phase registers).
//! - [`Instruction`]: one step of the pulse program: output flags, opcode, opcode data and
//!   length in nanoseconds.
//! - [`DdsChannel`] / [`DdsInstruction`]: an [`Instruction`] extended with the register
//!   selection of both DDS channels.
//! - [`RawInstructionDds2`]: the fully encoded argument list of the native `pb_inst_dds2`
//!   call, with every field at its native width.
//!
//! An instruction only exists for the duration of one native call: it is encoded by value
//! into a [`RawInstructionDds2`] and handed to the library, which returns the address of the
//! programmed instruction.

use std::fmt;

use crate::error::{FlagsError, UnknownCode};
use crate::flags::Flags;

pub const ANALOG_ON: i32 = 1;
pub const ANALOG_OFF: i32 = 0;
pub const PHASE_RESET: i32 = 1;
pub const NO_PHASE_RESET: i32 = 0;

/// Instruction types of the PulseBlaster instruction set.
///
/// The meaning of the instruction data depends on the opcode: the loop count for
/// [`Opcode::Loop`], a target address for [`Opcode::Branch`], [`Opcode::Jsr`] and
/// [`Opcode::EndLoop`], a repeat count for [`Opcode::LongDelay`]. It is ignored otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Opcode {
    Continue = 0,
    Stop = 1,
    Loop = 2,
    EndLoop = 3,
    Jsr = 4,
    Rts = 5,
    Branch = 6,
    LongDelay = 7,
    Wait = 8,
    Rti = 9,
}

impl Opcode {
    pub const ALL: [Opcode; 10] = [
        Opcode::Continue,
        Opcode::Stop,
        Opcode::Loop,
        Opcode::EndLoop,
        Opcode::Jsr,
        Opcode::Rts,
        Opcode::Branch,
        Opcode::LongDelay,
        Opcode::Wait,
        Opcode::Rti,
    ];

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Upper-case name used by the vendor headers and the python module.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Continue => "CONTINUE",
            Opcode::Stop => "STOP",
            Opcode::Loop => "LOOP",
            Opcode::EndLoop => "END_LOOP",
            Opcode::Jsr => "JSR",
            Opcode::Rts => "RTS",
            Opcode::Branch => "BRANCH",
            Opcode::LongDelay => "LONG_DELAY",
            Opcode::Wait => "WAIT",
            Opcode::Rti => "RTI",
        }
    }
}

impl TryFrom<i32> for Opcode {
    type Error = UnknownCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.code() == code)
            .ok_or(UnknownCode { kind: "opcode", code })
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Memory opened by `pb_start_programming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ProgramTarget {
    PulseProgram = 0,
    FreqRegs = 1,
    PhaseRegs = 2,
}

impl ProgramTarget {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            ProgramTarget::PulseProgram => "PULSE_PROGRAM",
            ProgramTarget::FreqRegs => "FREQ_REGS",
            ProgramTarget::PhaseRegs => "PHASE_REGS",
        }
    }
}

impl TryFrom<i32> for ProgramTarget {
    type Error = UnknownCode;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ProgramTarget::PulseProgram),
            1 => Ok(ProgramTarget::FreqRegs),
            2 => Ok(ProgramTarget::PhaseRegs),
            _ => Err(UnknownCode {
                kind: "programming target",
                code,
            }),
        }
    }
}

impl fmt::Display for ProgramTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One step of the pulse program.
///
/// `length` is in nanoseconds; use the constants of [`crate::units`] to scale it.
///
/// ```
/// use pbinstr_backend::instruction::*;
/// use pbinstr_backend::units::US;
///
/// let instr = Instruction::new("111111111111", Opcode::Continue, 0, 100.0 * US);
/// let raw = instr.encode().unwrap();
/// assert_eq!(raw.flags, 0xFFF);
/// assert_eq!(raw.freq0, 0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub flags: Flags,
    pub opcode: Opcode,
    pub data: i32,
    pub length: f64,
}

impl Instruction {
    pub fn new(flags: impl Into<Flags>, opcode: Opcode, data: i32, length: f64) -> Self {
        Instruction {
            flags: flags.into(),
            opcode,
            data,
            length,
        }
    }

    /// Encodes the instruction for `pb_inst_dds2` with every DDS field set to zero.
    pub fn encode(&self) -> Result<RawInstructionDds2, FlagsError> {
        DdsInstruction::new(DdsChannel::default(), DdsChannel::default(), self.clone()).encode()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "[{}, {}, data={}, length={}ns]",
            self.flags, self.opcode, self.data, self.length
        )
    }
}

/// Register selection of one DDS channel for a single instruction.
///
/// The `*_reg` fields are indices into the frequency, phase and amplitude registers
/// previously programmed on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DdsChannel {
    pub freq_reg: i32,
    pub phase_reg: i32,
    pub amp_reg: i32,
    pub output_enabled: bool,
    pub phase_reset: bool,
}

impl DdsChannel {
    pub fn new(freq_reg: i32, phase_reg: i32, amp_reg: i32, output_enabled: bool, phase_reset: bool) -> Self {
        DdsChannel {
            freq_reg,
            phase_reg,
            amp_reg,
            output_enabled,
            phase_reset,
        }
    }

    fn output_code(&self) -> i32 {
        if self.output_enabled {
            ANALOG_ON
        } else {
            ANALOG_OFF
        }
    }

    fn phase_reset_code(&self) -> i32 {
        if self.phase_reset {
            PHASE_RESET
        } else {
            NO_PHASE_RESET
        }
    }
}

/// A full instruction including both DDS channels.
#[derive(Debug, Clone, PartialEq)]
pub struct DdsInstruction {
    pub dds0: DdsChannel,
    pub dds1: DdsChannel,
    pub instr: Instruction,
}

impl DdsInstruction {
    pub fn new(dds0: DdsChannel, dds1: DdsChannel, instr: Instruction) -> Self {
        DdsInstruction { dds0, dds1, instr }
    }

    /// Resolves the flag word and lays out all fourteen `pb_inst_dds2` arguments.
    pub fn encode(&self) -> Result<RawInstructionDds2, FlagsError> {
        let flags = self.instr.flags.encode()?;
        Ok(RawInstructionDds2 {
            freq0: self.dds0.freq_reg,
            phase0: self.dds0.phase_reg,
            amp0: self.dds0.amp_reg,
            dds_en0: self.dds0.output_code(),
            phase_reset0: self.dds0.phase_reset_code(),
            freq1: self.dds1.freq_reg,
            phase1: self.dds1.phase_reg,
            amp1: self.dds1.amp_reg,
            dds_en1: self.dds1.output_code(),
            phase_reset1: self.dds1.phase_reset_code(),
            // The native argument is a signed int; flag 31 lands in the sign bit.
            flags: flags as i32,
            inst: self.instr.opcode.code(),
            inst_data: self.instr.data,
            length: self.instr.length,
        })
    }
}

/// Argument list of the native `pb_inst_dds2` call, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawInstructionDds2 {
    pub freq0: i32,
    pub phase0: i32,
    pub amp0: i32,
    pub dds_en0: i32,
    pub phase_reset0: i32,
    pub freq1: i32,
    pub phase1: i32,
    pub amp1: i32,
    pub dds_en1: i32,
    pub phase_reset1: i32,
    pub flags: i32,
    pub inst: i32,
    pub inst_data: i32,
    pub length: f64,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::units::*;

    #[test]
    fn opcode_codes_match_vendor_header() {
        let codes: Vec<i32> = Opcode::ALL.iter().map(|op| op.code()).collect();
        assert_eq!(codes, (0..10).collect::<Vec<i32>>());
        assert_eq!(Opcode::Branch.code(), 6);
        assert_eq!(Opcode::LongDelay.name(), "LONG_DELAY");
        assert_eq!(Opcode::try_from(8), Ok(Opcode::Wait));
        assert!(Opcode::try_from(10).is_err());
        assert!(Opcode::try_from(-1).is_err());
    }

    #[test]
    fn program_target_codes() {
        assert_eq!(ProgramTarget::PulseProgram.code(), 0);
        assert_eq!(ProgramTarget::FreqRegs.code(), 1);
        assert_eq!(ProgramTarget::PhaseRegs.code(), 2);
        assert_eq!(ProgramTarget::try_from(2), Ok(ProgramTarget::PhaseRegs));
        assert_eq!(
            ProgramTarget::try_from(3),
            Err(UnknownCode {
                kind: "programming target",
                code: 3
            })
        );
    }

    #[test]
    fn plain_instruction_zeroes_dds_fields() {
        let raw = Instruction::new("000000000001", Opcode::Branch, 4, 1.5 * MS)
            .encode()
            .unwrap();
        assert_eq!(
            raw,
            RawInstructionDds2 {
                flags: 1 << 11,
                inst: 6,
                inst_data: 4,
                length: 1.5e6,
                ..Default::default()
            }
        );
    }

    #[test]
    fn dds_fields_keep_call_order() {
        let instr = DdsInstruction::new(
            DdsChannel::new(1, 2, 3, true, false),
            DdsChannel::new(4, 5, 6, false, true),
            Instruction::new(0b101u32, Opcode::Continue, 0, 10.0 * US),
        );
        let raw = instr.encode().unwrap();
        assert_eq!(
            (raw.freq0, raw.phase0, raw.amp0, raw.dds_en0, raw.phase_reset0),
            (1, 2, 3, ANALOG_ON, NO_PHASE_RESET)
        );
        assert_eq!(
            (raw.freq1, raw.phase1, raw.amp1, raw.dds_en1, raw.phase_reset1),
            (4, 5, 6, ANALOG_OFF, PHASE_RESET)
        );
        assert_eq!(raw.flags, 5);
        assert_eq!(raw.length, 10000.0);
    }

    #[test]
    fn flag_31_is_the_sign_bit() {
        let text = format!("{}1", "0".repeat(31));
        let raw = Instruction::new(text, Opcode::Continue, 0, 1.0).encode().unwrap();
        assert_eq!(raw.flags, i32::MIN);
    }

    #[test]
    fn bad_flags_fail_encoding() {
        let instr = Instruction::new("1a", Opcode::Stop, 0, 1.0);
        assert!(matches!(
            instr.encode(),
            Err(FlagsError::InvalidChar { ch: 'a', index: 1, .. })
        ));
    }
}
