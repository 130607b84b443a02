//! A binding to the SpinCore PulseBlaster `spinapi` library.
//!
//! - [`spinapi`]: native entry points and the `libloading`-backed library.
//! - [`loader`]: platform table, `SPINAPI_*` configuration and lazy loading.
//! - [`board`]: the [`PulseBlaster`] handle and register helpers.
//! - [`driver`]: program-and-run operator tooling.
//! - [`mock`]: an in-process library for tests.
//!
//! Hardware-free marshalling (flags, status, instructions, policy table, units) comes from
//! `pbinstr_backend` and is re-exported here.

pub mod board;
pub mod driver;
pub mod error;
pub mod loader;
pub mod logging;
pub mod mock;
pub mod spinapi;

#[cfg(feature = "python")]
pub mod python;

pub use crate::board::*;
pub use crate::driver::*;
pub use crate::error::{Result, SpinError};
pub use crate::loader::*;
pub use crate::spinapi::{NativeLibrary, SpinApi};
pub use pbinstr_backend::*;
