//! crates/source/src/error.rs

use thiserror::Error;

/// Result type returned by the source client.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised talking to the source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A connection-level failure (transport or protocol).
    #[error(transparent)]
    Wire(#[from] wire::WireError),
    /// The source rejected the auth exchange.
    #[error("source rejected authentication: {0}")]
    AuthRejected(String),
    /// A heartbeat probe did not receive the expected `PONG`.
    #[error("heartbeat probe failed: expected PONG, got {0:?}")]
    HeartbeatFailed(String),
}
