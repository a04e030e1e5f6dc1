//! Error types for bufsync-types.

use thiserror::Error;

use crate::OffsetEncoding;

/// Errors converting an editor selection offset into a byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OffsetError {
    /// Offsets are never negative.
    #[error("negative offset: {offset}")]
    Negative {
        /// The offending offset.
        offset: i64,
    },

    /// Offset points past the end of the text.
    #[error("offset {offset} out of bounds (text length: {len} units)")]
    OutOfBounds {
        /// The offending offset.
        offset: i64,
        /// Text length in the offset's encoding units.
        len: usize,
    },

    /// Offset points inside a code point (UTF-8) or a surrogate pair (UTF-16).
    #[error("offset {offset} is not aligned to a {encoding} code point boundary")]
    Misaligned {
        /// The offending offset.
        offset: i64,
        /// Encoding the offset was declared in.
        encoding: OffsetEncoding,
    },
}

/// Error parsing a hex-encoded [`ContentHash`](crate::ContentHash).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashParseError {
    /// Not valid hexadecimal.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Decoded to the wrong number of bytes.
    #[error("invalid hash length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}
