//! Decoding of the board status word returned by `pb_read_status`.
//!
//! Only the four lowest bits carry meaning, in the vendor's documented order:
//!
//! | bit | flag      |
//! |-----|-----------|
//! | 0   | `stopped` |
//! | 1   | `reset`   |
//! | 2   | `running` |
//! | 3   | `waiting` |
//!
//! All higher bits are ignored.

use std::fmt;

use indexmap::IndexMap;

pub const STATUS_STOPPED_BIT: u32 = 0;
pub const STATUS_RESET_BIT: u32 = 1;
pub const STATUS_RUNNING_BIT: u32 = 2;
pub const STATUS_WAITING_BIT: u32 = 3;

/// Decoded board status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoardStatus {
    pub stopped: bool,
    pub reset: bool,
    pub running: bool,
    pub waiting: bool,
}

impl BoardStatus {
    /// Decodes a raw status word.
    ///
    /// ```
    /// use pbinstr_backend::status::BoardStatus;
    ///
    /// let status = BoardStatus::from_raw(0b0100);
    /// assert!(status.running && !status.stopped && !status.reset && !status.waiting);
    /// ```
    pub fn from_raw(word: u32) -> Self {
        let bit = |n: u32| word & (1u32 << n) != 0;
        Self {
            stopped: bit(STATUS_STOPPED_BIT),
            reset: bit(STATUS_RESET_BIT),
            running: bit(STATUS_RUNNING_BIT),
            waiting: bit(STATUS_WAITING_BIT),
        }
    }

    /// Re-encodes the four known flags. Unknown high bits of the original word are lost.
    pub fn to_raw(&self) -> u32 {
        [
            (self.stopped, STATUS_STOPPED_BIT),
            (self.reset, STATUS_RESET_BIT),
            (self.running, STATUS_RUNNING_BIT),
            (self.waiting, STATUS_WAITING_BIT),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0u32, |word, (_, n)| word | (1u32 << *n))
    }

    /// Name-to-flag map in bit order, as handed to scripting front-ends.
    pub fn to_map(&self) -> IndexMap<&'static str, bool> {
        IndexMap::from([
            ("stopped", self.stopped),
            ("reset", self.reset),
            ("running", self.running),
            ("waiting", self.waiting),
        ])
    }
}

impl From<u32> for BoardStatus {
    fn from(word: u32) -> Self {
        BoardStatus::from_raw(word)
    }
}

impl fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let set_flags = self
            .to_map()
            .into_iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| name)
            .collect::<Vec<&str>>();
        write!(f, "BoardStatus({})", set_flags.join(", "))
    }
}
