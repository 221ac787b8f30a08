//! Error types for the wiretrace-core library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! detailed variants for cursor-level and structure-level failure modes.

use thiserror::Error;

/// Result type alias for wiretrace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all wiretrace operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Fewer bytes were available than an exact-count read demanded
    #[error("short read at offset {offset}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        /// Cursor offset when the read was issued
        offset: u64,
        /// Number of bytes requested
        wanted: usize,
        /// Number of bytes actually produced
        got: usize,
    },

    /// Struct-format string malformed or mismatched against supplied values
    #[error("bad struct format '{fmt}': {details}")]
    BadFormat {
        /// The offending format string
        fmt: String,
        /// Detailed description of the issue
        details: String,
    },

    /// Endian marker was not one of the two recognized values
    #[error("invalid endian marker '{0}': expected '>' or '<'")]
    InvalidEndian(char),

    /// Seek target outside the bounds of a storage that disallows growth
    #[error("seek out of range: position {pos} outside buffer of {len} bytes")]
    SeekOutOfRange {
        /// Requested position
        pos: u64,
        /// Length of the underlying storage
        len: u64,
    },

    /// Programmer error in stack discipline (unbalanced push/pop, scope misuse)
    #[error("structural misuse: {0}")]
    StructuralMisuse(String),

    /// I/O error from an externally supplied stream
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Creates a new short read error
    pub fn short_read(offset: u64, wanted: usize, got: usize) -> Self {
        Self::ShortRead {
            offset,
            wanted,
            got,
        }
    }

    /// Creates a new bad format error
    pub fn bad_format(fmt: impl Into<String>, details: impl Into<String>) -> Self {
        Self::BadFormat {
            fmt: fmt.into(),
            details: details.into(),
        }
    }

    /// Creates a new structural misuse error
    pub fn structural_misuse(msg: impl Into<String>) -> Self {
        Self::StructuralMisuse(msg.into())
    }

    /// Returns true if this error came from the cursor running out of bytes
    pub fn is_short_read(&self) -> bool {
        matches!(self, Self::ShortRead { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::short_read(16, 4, 1);
        assert!(err.to_string().contains("offset 16"));
        assert!(err.to_string().contains("wanted 4"));

        let err = Error::bad_format(">Z", "unknown type code 'Z'");
        assert!(err.to_string().contains(">Z"));
    }

    #[test]
    fn test_is_short_read() {
        assert!(Error::short_read(0, 2, 0).is_short_read());
        assert!(!Error::InvalidEndian('x').is_short_read());
    }
}
