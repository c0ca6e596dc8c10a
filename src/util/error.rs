//! Error types for the AET codec.

use thiserror::Error;

use super::FileAddr;

/// Main error type for AET encode/decode operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Signature mismatch or an unsupported layout combination
    #[error("Bad format: {0}")]
    BadFormat(String),

    /// Array count or block size outside sane bounds
    #[error("Bad count for {what}: {count}")]
    BadCount { what: &'static str, count: u64 },

    /// Offset outside the stream, or one that fails a sanity pre-check
    #[error("Bad pointer for {what}: {addr}")]
    BadPointer { what: &'static str, addr: FileAddr },

    /// Output buffer or address space exhausted
    #[error("Insufficient space: {0}")]
    InsufficientSpace(String),

    /// Anything that does not fit the kinds above
    #[error("{0}")]
    UnknownError(String),

    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create a bad format error from a message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::BadFormat(msg.into())
    }

    /// Create a bad pointer error for the named field.
    pub fn pointer(what: &'static str, addr: FileAddr) -> Self {
        Self::BadPointer { what, addr }
    }

    /// Create a bad count error for the named array.
    pub fn count(what: &'static str, count: impl Into<u64>) -> Self {
        Self::BadCount { what, count: count.into() }
    }

    /// Create an "unknown" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::UnknownError(msg.into())
    }

    /// True for the structural rejection kinds (not I/O).
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::BadFormat(_) | Self::BadCount { .. } | Self::BadPointer { .. } | Self::Utf8(_)
        )
    }
}

/// Result type alias for AET operations.
pub type Result<T> = std::result::Result<T, Error>;
