//! crates/flow/src/error.rs

use thiserror::Error;

/// Result type returned by the flow writer.
pub type FlowResult<T> = Result<T, FlowError>;

/// Errors raised while writing decoded entries to the destination.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A destination-side transport or protocol failure.
    #[error(transparent)]
    Cluster(#[from] cluster::ClusterError),
    /// A `panic` conflict policy observed an existing key.
    #[error("conflict policy `panic` triggered on key {0:?}: key already exists on the destination")]
    Conflict(Vec<u8>),
}
