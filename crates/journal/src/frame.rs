//! crates/journal/src/frame.rs
//!
//! The journal frame types. A frame is the unit the replication engine
//! replays one at a time, whether it arrives over a stable-sync connection
//! or embedded inline in an RDB snapshot (opcode `0xD2`).

/// A parsed command payload, shared by `COMMAND` and `EXPIRED` frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPayload {
    /// Transaction identifier; groups entries from the same cross-shard transaction.
    pub txid: u64,
    /// Number of shards participating in this transaction (1 for single-shard commands).
    pub shard_count: u32,
    /// The command name, e.g. `SET`, `MSET`, `FLUSHALL`.
    pub name: Vec<u8>,
    /// The command's arguments, excluding the name.
    pub args: Vec<Vec<u8>>,
}

/// One decoded journal frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    /// No-op; ignored by the replay path.
    Noop,
    /// Selects the current database index for subsequent frames on this shard.
    Select(u32),
    /// A key expiration observed at the source; replayed as a short `PEXPIRE`.
    Expired(CommandPayload),
    /// A command to forward (or rendezvous on, for cross-shard transactions).
    Command(CommandPayload),
    /// Keep-alive; ignored by the replay path.
    Ping,
    /// Records the shard's latest applied sequence number.
    Lsn(u64),
}

impl JournalEntry {
    /// Returns the opcode byte this entry would be framed with on the wire.
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        match self {
            Self::Noop => 0,
            Self::Select(_) => 6,
            Self::Expired(_) => 9,
            Self::Command(_) => 10,
            Self::Ping => 13,
            Self::Lsn(_) => 15,
        }
    }
}
