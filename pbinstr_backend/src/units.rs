//! Unit constants of the vendor API.
//!
//! Instruction lengths are expressed in nanoseconds and DDS frequencies in MHz, so a
//! length of `100.0 * US` is 100 microseconds and `2.5 * KHZ` is 2.5 kHz.

// Time, in nanoseconds
pub const NS: f64 = 1.0;
pub const US: f64 = 1000.0;
pub const MS: f64 = 1000000.0;
pub const S: f64 = 1000000000.0;

// Frequency, in MHz
pub const MHZ: f64 = 1.0;
pub const KHZ: f64 = 0.001;
pub const HZ: f64 = 0.000001;
