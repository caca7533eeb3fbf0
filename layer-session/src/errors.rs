//! Error types for layer-session.

use std::{fmt, io};

// ─── CodecError ───────────────────────────────────────────────────────────────

/// Why a session file could not be decoded.
///
/// None of these are fatal: the store treats an undecodable file exactly like
/// a missing one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The leading magic number does not belong to this record family.
    BadMagic { expected: u32, found: u32 },
    /// The buffer ended before the record was complete.
    Truncated,
    /// A declared length, count or enum value is outside its sane bound.
    OutOfRange { field: &'static str, value: i64 },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic { expected, found } => {
                write!(f, "bad magic: expected {expected:#010x}, found {found:#010x}")
            }
            Self::Truncated => write!(f, "unexpected end of data"),
            Self::OutOfRange { field, value } => write!(f, "{field} out of range: {value}"),
        }
    }
}

impl std::error::Error for CodecError {}

// ─── StoreError ───────────────────────────────────────────────────────────────

/// The error type returned by the write side of [`crate::SessionStore`].
#[derive(Debug)]
pub enum StoreError {
    /// The backend failed to read or write a resource.
    Io(io::Error),
    /// A resource existed but could not be decoded.
    Codec(CodecError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)    => write!(f, "I/O error: {e}"),
            Self::Codec(e) => write!(f, "corrupt session data: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e)    => Some(e),
            Self::Codec(e) => Some(e),
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<CodecError> for StoreError {
    fn from(e: CodecError) -> Self { Self::Codec(e) }
}
