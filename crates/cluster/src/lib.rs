//! Destination cluster client.
//!
//! Discovers a cluster destination's slot→node map (or falls back to a
//! single-node topology for a standalone destination), routes commands by
//! slot, pipelines per-node batches, and retries once on `MOVED`.

mod client;
mod error;
mod slot;
mod topology;

pub use client::ClusterClient;
pub use error::{ClusterError, ClusterResult};
pub use slot::{crc16, hash_tag, slot};
pub use topology::Topology;
