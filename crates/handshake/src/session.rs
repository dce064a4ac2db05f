//! crates/handshake/src/session.rs
//!
//! The data model produced by a successful handshake: a read-only session
//! descriptor and one flow descriptor per shard.

/// Identifies a negotiated replication session. Produced once by the
/// control-connection exchange; read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    /// Opaque replication identifier returned by the source.
    pub repl_id: Vec<u8>,
    /// Opaque ASCII session token returned by the source.
    pub session_id: String,
    /// Number of shards the source will open flow connections for.
    pub shard_count: u32,
    /// Protocol version the source negotiated.
    pub version: u32,
}

/// Whether a shard's flow connection starts from a full snapshot or resumes
/// from a previously-checkpointed journal position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// The source will send a full RDB snapshot before the journal.
    Full,
    /// The source will resume the journal directly, skipping the snapshot.
    Partial,
}

/// The 40-byte marker the source sends once the snapshot side of a flow
/// connection completes.
pub type EofToken = [u8; 40];

/// One shard's negotiated flow: how its connection starts, and the
/// connection itself once registration completes.
pub struct FlowDescriptor {
    /// This flow's shard index, in `0..shard_count`.
    pub shard_index: u32,
    /// Whether this shard starts full or partial.
    pub sync_kind: SyncKind,
    /// The end-of-file marker this shard's source will send after its
    /// snapshot (or, for `Partial`, the token negotiated at registration).
    pub eof_token: EofToken,
    /// The flow's dedicated connection, already past registration.
    pub client: source::SourceClient,
}
