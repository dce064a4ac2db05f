//! crates/journal/src/error.rs

use thiserror::Error;

/// Result type returned by the journal codec.
pub type JournalResult<T> = Result<T, JournalError>;

/// Errors raised while decoding a journal frame.
#[derive(Debug, Error)]
pub enum JournalError {
    /// A low-level byte primitive failed (short read, bad varint, bad LZF).
    #[error(transparent)]
    Decode(#[from] decode::DecodeError),
    /// The opcode byte did not match any of the six recognized frame kinds.
    #[error("unrecognized journal opcode: {0}")]
    UnknownOpcode(u8),
    /// The payload block's advertised element count was zero (a COMMAND or
    /// EXPIRED frame must carry at least a command name).
    #[error("journal payload declared zero elements")]
    EmptyPayload,
}
