//! crates/handshake/src/state.rs
//!
//! The handshake controller's lifecycle states, per §4.3. `Stopped` is the
//! only terminal state; every other transition is driven by
//! [`crate::controller::HandshakeController`].

/// One state in the handshake/replication lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No connection has been attempted yet.
    Disconnected,
    /// The control connection is being opened.
    Connecting,
    /// The fixed control-connection exchange (§4.3 steps 1-6) is in progress.
    Handshaking,
    /// Per-shard flow connections are being opened and registered.
    Preparation,
    /// At least one shard is streaming its initial snapshot.
    FullSync,
    /// Every shard has transitioned to journal streaming.
    StableSync,
    /// The engine has shut down; terminal.
    Stopped,
}

impl HandshakeState {
    /// Returns `true` for the one terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped)
    }
}
