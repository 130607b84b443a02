//! Flag-word encoding.
//!
//! The PulseBlaster output flags are a bitmask where bit `i` drives output line `i`.
//! Callers usually write them as literal strings of ones and zeros. In that textual form
//! **the first character is flag 0**, so the string reads in the reverse order of the
//! binary number it encodes:
//!
//! ```text
//! flag:   0          11
//!        '101100011111'      <- text
//!
//! flag:  11          0
//!      0b111110001101        <- bitmask (3981)
//! ```
//!
//! The [`Flags`] variant makes the choice between the two forms explicit at the API
//! boundary; [`Flags::encode`] resolves it once before the native call.

use std::fmt;

use crate::error::FlagsError;

/// Number of flags a native flag word can hold.
pub const FLAG_WORD_BITS: usize = 32;

/// A flag word given either as a pre-encoded bitmask or as text with flag 0 first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flags {
    Bits(u32),
    Text(String),
}

impl Flags {
    /// Resolves the flag word to its bitmask.
    ///
    /// ```
    /// use pbinstr_backend::flags::Flags;
    ///
    /// assert_eq!(Flags::from("101100011111").encode(), Ok(3981));
    /// assert_eq!(Flags::from(3981u32).encode(), Ok(3981));
    /// ```
    pub fn encode(&self) -> Result<u32, FlagsError> {
        match self {
            Flags::Bits(bits) => Ok(*bits),
            Flags::Text(text) => encode_flags(text),
        }
    }
}

impl From<u32> for Flags {
    fn from(bits: u32) -> Self {
        Flags::Bits(bits)
    }
}

impl From<&str> for Flags {
    fn from(text: &str) -> Self {
        Flags::Text(text.to_string())
    }
}

impl From<String> for Flags {
    fn from(text: String) -> Self {
        Flags::Text(text)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Flags::Bits(bits) => write!(f, "{:#b}", bits),
            Flags::Text(text) => write!(f, "'{}'", text),
        }
    }
}

/// Encodes a flag string (flag 0 first) into a bitmask.
///
/// Equivalent to reversing the string and parsing it as a base-2 number.
///
/// # Errors
/// * [`FlagsError::Empty`] for an empty string.
/// * [`FlagsError::InvalidChar`] for anything other than `'0'` or `'1'`.
/// * [`FlagsError::TooWide`] for more than [`FLAG_WORD_BITS`] characters.
///
/// ```
/// use pbinstr_backend::flags::encode_flags;
///
/// assert_eq!(encode_flags("1"), Ok(0b1));
/// assert_eq!(encode_flags("0001"), Ok(0b1000));
/// assert!(encode_flags("10x1").is_err());
/// ```
pub fn encode_flags(text: &str) -> Result<u32, FlagsError> {
    let len = text.chars().count();
    if len == 0 {
        return Err(FlagsError::Empty);
    }
    if len > FLAG_WORD_BITS {
        return Err(FlagsError::TooWide {
            input: text.to_string(),
            len,
            max: FLAG_WORD_BITS,
        });
    }
    text.chars()
        .enumerate()
        .try_fold(0u32, |bits, (index, ch)| match ch {
            '0' => Ok(bits),
            '1' => Ok(bits | (1u32 << index)),
            _ => Err(FlagsError::InvalidChar {
                input: text.to_string(),
                ch,
                index,
            }),
        })
}

/// Renders the lowest `width` flags of a bitmask as text, flag 0 first.
///
/// This is the inverse of [`encode_flags`] for strings of length `width`. Bits at or
/// above `width` are not rendered.
///
/// ```
/// use pbinstr_backend::flags::decode_flags;
///
/// assert_eq!(decode_flags(3981, 12), "101100011111");
/// ```
pub fn decode_flags(bits: u32, width: usize) -> String {
    (0..width.min(FLAG_WORD_BITS))
        .map(|i| if bits & (1u32 << i) != 0 { '1' } else { '0' })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_char_is_lowest_flag() {
        assert_eq!(encode_flags("100000000000"), Ok(1));
        assert_eq!(encode_flags("000000000001"), Ok(1 << 11));
        assert_eq!(encode_flags("111111111111"), Ok(0xFFF));
        assert_eq!(encode_flags("000000000000"), Ok(0));
    }

    #[test]
    fn matches_reverse_then_parse() {
        for text in ["1", "01", "110", "101100011111", "0110100101110001"] {
            let reversed: String = text.chars().rev().collect();
            let expected = u32::from_str_radix(&reversed, 2).unwrap();
            assert_eq!(encode_flags(text), Ok(expected), "text {}", text);
        }
    }

    #[test]
    fn full_word_is_accepted() {
        let text = "1".repeat(FLAG_WORD_BITS);
        assert_eq!(encode_flags(&text), Ok(u32::MAX));
    }

    #[test]
    fn malformed_text_is_rejected() {
        assert_eq!(encode_flags(""), Err(FlagsError::Empty));
        assert_eq!(
            encode_flags("1021"),
            Err(FlagsError::InvalidChar {
                input: "1021".to_string(),
                ch: '2',
                index: 2
            })
        );
        let text = "0".repeat(FLAG_WORD_BITS + 1);
        assert!(matches!(
            encode_flags(&text),
            Err(FlagsError::TooWide { len: 33, .. })
        ));
    }

    #[test]
    fn decode_restores_text() {
        for text in ["0", "1", "0010", "101100011111", "000000000001"] {
            let bits = encode_flags(text).unwrap();
            assert_eq!(decode_flags(bits, text.len()), text);
        }
    }

    #[test]
    fn bits_pass_through() {
        assert_eq!(Flags::Bits(0xDEAD).encode(), Ok(0xDEAD));
        assert_eq!(Flags::from("11".to_string()).encode(), Ok(3));
    }
}
