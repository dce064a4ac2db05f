//! Atomic on-disk persistence of per-shard replication progress, per §4.9.
//!
//! [`CheckpointManager`] is the only thing that touches the filesystem;
//! [`CheckpointRecord`] is the data it persists. A record only resumes a
//! session whose `repl_id`/`session_id` match what the next handshake
//! returns — see [`CheckpointRecord::matches_session`].

mod error;
mod manager;
mod record;

pub use error::{CheckpointError, CheckpointResult};
pub use manager::CheckpointManager;
pub use record::CheckpointRecord;
