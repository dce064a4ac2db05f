//! crates/cluster/src/error.rs

use thiserror::Error;

/// Result type returned by the cluster client.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors raised by topology discovery or routed command execution.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A connection-level failure (transport or protocol) talking to a node.
    #[error(transparent)]
    Wire(#[from] wire::WireError),
    /// The destination's slot mapping could not be built from its topology reply.
    #[error("could not build a slot map from the destination's topology reply: {0}")]
    Topology(String),
    /// A command was redirected with `MOVED` a second time after the client
    /// already retried once against the indicated node.
    #[error("received a second MOVED redirection for the same command (to {0})")]
    DoubleMoved(String),
    /// The destination returned an unexpected reply shape for a command
    /// whose reply this client must interpret structurally (e.g. `EXISTS`).
    #[error("unexpected reply shape from destination: {0}")]
    UnexpectedReply(String),
}
