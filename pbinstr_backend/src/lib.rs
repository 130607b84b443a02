//! Hardware-free marshalling for the SpinCore PulseBlaster API.
//!
//! Everything in this crate can be exercised without a board or the vendor library:
//! - [`flags`]: flag words written as `'0'`/`'1'` text (flag 0 first) or as integers.
//! - [`status`]: decoding of the 32-bit `pb_read_status` word.
//! - [`instruction`]: opcodes, programming targets and the raw `pb_inst_dds2` record.
//! - [`policy`]: which return codes count as failure, per native entry point.
//! - [`units`]: time and frequency unit constants used by the vendor API.
//!
//! The native side (library loading, the board handle, python bindings) lives in
//! `pbctrl_backend`.

pub mod error;
pub mod flags;
pub mod instruction;
pub mod policy;
pub mod status;
pub mod units;

pub use error::*;
pub use flags::*;
pub use instruction::*;
pub use policy::*;
pub use status::*;
