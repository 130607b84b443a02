//! Error type for every fallible operation of the binding.

use std::path::PathBuf;

use pbinstr_backend::FlagsError;
use thiserror::Error;

/// Result type alias for spinapi operations.
pub type Result<T> = std::result::Result<T, SpinError>;

#[derive(Error, Debug)]
pub enum SpinError {
    /// No spinapi build exists for this OS / pointer-width combination.
    #[error("spinapi is not available for {os} with {pointer_width}-bit pointers")]
    UnsupportedPlatform { os: String, pointer_width: u32 },

    #[error("Failed to load spinapi library '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("Symbol '{symbol}' not found in spinapi library: {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    /// A native call returned a failing code; `message` is what `pb_get_error` reported.
    #[error("{symbol} failed (code {code}): {message}")]
    Native {
        symbol: &'static str,
        code: i32,
        message: String,
    },

    #[error("Invalid flags: {0}")]
    Flags(#[from] FlagsError),

    /// Loader failure outside of libloading, e.g. from a test double.
    #[error("Failed to load spinapi: {message}")]
    LoadFailed { message: String },
}

impl SpinError {
    pub fn is_unsupported_platform(&self) -> bool {
        matches!(self, SpinError::UnsupportedPlatform { .. })
    }

    /// Message reported by the native library, if this is a native-call failure.
    pub fn native_message(&self) -> Option<&str> {
        match self {
            SpinError::Native { message, .. } => Some(message),
            _ => None,
        }
    }
}
