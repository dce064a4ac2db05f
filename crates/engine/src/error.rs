//! crates/engine/src/error.rs
//!
//! The seven error kinds the run surfaces at its outer boundary (§7). Every
//! lower crate's error type folds into one of these; the mapping decides
//! what a fatal error looks like to whatever drives the process's exit
//! code.

use thiserror::Error;

/// Result type returned by the engine's orchestration functions.
pub type EngineResult<T> = Result<T, EngineError>;

/// One of the seven outcomes a replication run can end with.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Socket read/write failure or unexpected EOF, on either side.
    #[error("transport error: {0}")]
    Transport(String),
    /// Malformed RESP frame, bad RDB opcode, bad listpack header, bad checksum.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The source returned a non-negotiated handshake reply.
    #[error("incompatible peer: {0}")]
    IncompatiblePeer(String),
    /// The cluster slot mapping could not be built, or a command was
    /// redirected twice.
    #[error("topology error: {0}")]
    Topology(String),
    /// A `panic` conflict policy observed an existing key.
    #[error("conflict policy `panic` triggered on an existing key")]
    Conflict(Vec<u8>),
    /// A required configuration field was missing or invalid at load time.
    #[error("fatal configuration error: {0}")]
    FatalConfig(String),
    /// The engine's cancellation token was observed before the run finished.
    #[error("engine context cancelled")]
    Cancelled,
}

impl From<handshake::HandshakeError> for EngineError {
    fn from(err: handshake::HandshakeError) -> Self {
        use handshake::HandshakeError as H;
        match err {
            H::Source(source::SourceError::Wire(wire)) => wire.into(),
            H::Source(source::SourceError::AuthRejected(msg)) => Self::IncompatiblePeer(msg),
            H::Source(source::SourceError::HeartbeatFailed(msg)) => Self::Transport(msg),
            H::IncompatiblePeer => {
                Self::IncompatiblePeer("source did not recognize the replication capability".into())
            }
            H::MalformedReply(msg) => Self::Protocol(msg),
            H::UnrecognizedSyncKind(kind) => {
                Self::Protocol(format!("unrecognized sync kind: {kind:?}"))
            }
            H::BadEofTokenLength(len) => {
                Self::Protocol(format!("end-of-file token was {len} bytes, expected 40"))
            }
        }
    }
}

impl From<wire::WireError> for EngineError {
    fn from(err: wire::WireError) -> Self {
        match err {
            wire::WireError::Transport(io) => Self::Transport(io.to_string()),
            wire::WireError::Timeout => Self::Transport("operation timed out".into()),
            wire::WireError::Protocol(msg) => Self::Protocol(msg),
        }
    }
}

impl From<rdb::RdbError> for EngineError {
    fn from(err: rdb::RdbError) -> Self {
        match err {
            rdb::RdbError::Decode(decode::DecodeError::Io(io)) => Self::Transport(io.to_string()),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<journal::JournalError> for EngineError {
    fn from(err: journal::JournalError) -> Self {
        match err {
            journal::JournalError::Decode(decode::DecodeError::Io(io)) => {
                Self::Transport(io.to_string())
            }
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<cluster::ClusterError> for EngineError {
    fn from(err: cluster::ClusterError) -> Self {
        use cluster::ClusterError as C;
        match err {
            C::Wire(wire) => wire.into(),
            C::Topology(msg) => Self::Topology(msg),
            C::DoubleMoved(addr) => {
                Self::Topology(format!("received a second MOVED for the same command (to {addr})"))
            }
            C::UnexpectedReply(msg) => Self::Protocol(msg),
        }
    }
}

impl From<flow::FlowError> for EngineError {
    fn from(err: flow::FlowError) -> Self {
        match err {
            flow::FlowError::Cluster(cluster) => cluster.into(),
            flow::FlowError::Conflict(key) => Self::Conflict(key),
        }
    }
}

impl From<source::SourceError> for EngineError {
    fn from(err: source::SourceError) -> Self {
        match err {
            source::SourceError::Wire(wire) => wire.into(),
            source::SourceError::AuthRejected(msg) => Self::IncompatiblePeer(msg),
            source::SourceError::HeartbeatFailed(msg) => Self::Transport(msg),
        }
    }
}
