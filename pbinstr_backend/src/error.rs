use thiserror::Error;

/// Errors raised while turning a textual flag word into a bitmask.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlagsError {
    #[error("Flag string is empty")]
    Empty,

    /// Only `'0'` and `'1'` are accepted.
    #[error("Invalid character {ch:?} at flag {index} in flag string {input:?}")]
    InvalidChar { input: String, ch: char, index: usize },

    #[error("Flag string {input:?} has {len} flags, at most {max} fit in a flag word")]
    TooWide { input: String, len: usize, max: usize },
}

/// Raised when a raw integer does not name a known opcode or programming target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} code {code}")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub code: i32,
}
