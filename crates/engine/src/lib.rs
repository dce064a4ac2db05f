//! Orchestrates one replication run end to end: the handshake, one reader
//! and one writer per shard, the cross-shard transaction rendezvous, the
//! global full-sync barrier, and the periodic checkpoint and metrics tasks.
//!
//! Everything below the handshake is synchronous decoding bridged onto
//! async tasks; see [`reader`] for why.

mod barrier;
mod checkpoint_task;
mod engine;
mod error;
mod metrics_task;
mod reader;
mod replay;
mod transaction;

pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use transaction::TransactionRegistry;
