//! crates/wire/src/error.rs
//!
//! Wire-level errors: a short read/write is a [`WireError::Transport`]; a
//! malformed RESP frame is a [`WireError::Protocol`].

use std::io;

use thiserror::Error;

/// Result type for wire codec operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors raised while sending or receiving RESP frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// Socket read/write failure or unexpected EOF.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// Malformed RESP framing (bad header byte, bad length, truncated array).
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The caller-supplied deadline elapsed before the operation completed.
    #[error("operation timed out")]
    Timeout,
}

impl WireError {
    /// Builds a [`WireError::Protocol`] from a message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}
