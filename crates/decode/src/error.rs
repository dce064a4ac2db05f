//! crates/decode/src/error.rs
//!
//! Error types shared by the length, varint, and LZF primitives.

use std::io;

use thiserror::Error;

/// Result type returned by the low-level byte primitives.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors raised while parsing a primitive encoding.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The underlying reader failed or ended unexpectedly.
    #[error("short read: {0}")]
    Io(#[from] io::Error),
    /// A packed/varint integer exceeded the supported width.
    #[error("varint exceeds 64 bits")]
    VarintOverflow,
    /// A packed/varint integer ran out of bytes before its continuation bit cleared.
    #[error("truncated varint")]
    VarintTruncated,
    /// An LZF stream referenced data before the start of the output buffer.
    #[error("corrupt LZF stream: back-reference out of range")]
    LzfBadReference,
    /// An LZF stream produced a different length than advertised.
    #[error("corrupt LZF stream: expected {expected} decompressed bytes, got {actual}")]
    LzfLengthMismatch {
        /// Length advertised by the frame header.
        expected: usize,
        /// Length actually produced.
        actual: usize,
    },
    /// An LZF stream ended mid-token.
    #[error("corrupt LZF stream: truncated token")]
    LzfTruncated,
}
