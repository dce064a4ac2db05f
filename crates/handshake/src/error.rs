//! crates/handshake/src/error.rs

use thiserror::Error;

/// Result type returned by the handshake controller.
pub type HandshakeResult<T> = Result<T, HandshakeError>;

/// Errors raised while negotiating a replication session.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// A connection-level failure (transport or protocol).
    #[error(transparent)]
    Source(#[from] source::SourceError),
    /// The peer replied `OK` to the source-specific capability declaration,
    /// meaning it is not a Dragonfly-compatible source.
    #[error("peer is not a compatible source: it did not recognize the replication capability")]
    IncompatiblePeer,
    /// A handshake reply did not match its expected shape.
    #[error("malformed handshake reply: {0}")]
    MalformedReply(String),
    /// A per-shard registration reply's sync kind was neither `FULL` nor `PARTIAL`.
    #[error("unrecognized sync kind in registration reply: {0:?}")]
    UnrecognizedSyncKind(Vec<u8>),
    /// A per-shard end-of-file token was not exactly 40 bytes.
    #[error("end-of-file token was {0} bytes, expected 40")]
    BadEofTokenLength(usize),
}
