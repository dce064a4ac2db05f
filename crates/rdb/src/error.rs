//! crates/rdb/src/error.rs
//!
//! Errors raised while decoding a snapshot stream or one of its container
//! encodings.

use thiserror::Error;

/// Result type returned by the RDB decoder and its container parsers.
pub type RdbResult<T> = Result<T, RdbError>;

/// Errors raised while decoding an RDB snapshot.
#[derive(Debug, Error)]
pub enum RdbError {
    /// A low-level byte primitive failed (short read, bad varint, bad LZF).
    #[error(transparent)]
    Decode(#[from] decode::DecodeError),
    /// The stream did not open with the expected `REDIS0009` magic.
    #[error("bad RDB magic: expected REDIS0009, got {0:?}")]
    BadMagic(Vec<u8>),
    /// An opcode byte did not match any recognized data-type code or control opcode.
    #[error("unrecognized RDB opcode or type code: 0x{0:02x}")]
    UnknownOpcode(u8),
    /// A ziplist, listpack, or intset blob was internally inconsistent.
    #[error("malformed {container} encoding: {reason}")]
    MalformedContainer {
        /// Which container encoding failed to parse.
        container: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// A compressed blob's trailer was missing its `0xCB` sentinel.
    #[error("compressed blob did not end with the 0xCB sentinel")]
    MissingBlobSentinel,
    /// A ZSTD frame failed to decompress.
    #[error("zstd decompression failed: {0}")]
    Zstd(String),
    /// An LZ4 frame failed to decompress.
    #[error("lz4 decompression failed: {0}")]
    Lz4(String),
    /// An inline journal frame embedded in the snapshot failed to parse.
    ///
    /// Per the engine's error-handling design, a malformed inline journal
    /// frame is fatal: the snapshot containing it cannot be trusted.
    #[error("malformed inline journal frame: {0}")]
    InlineJournal(#[from] journal::JournalError),
}
