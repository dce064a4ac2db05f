//! crates/checkpoint/src/error.rs

use thiserror::Error;

/// Result type returned by the checkpoint manager.
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Errors raised while loading or persisting a checkpoint record.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// The checkpoint file could not be read or the staging file could not
    /// be written or renamed into place.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The checkpoint file's contents did not deserialize as a record.
    #[error("malformed checkpoint record: {0}")]
    Malformed(#[from] serde_json::Error),
}
