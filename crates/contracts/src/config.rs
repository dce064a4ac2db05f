//! crates/contracts/src/config.rs
//!
//! The inbound configuration contract (§6): everything the CLI/YAML loader
//! — deliberately out of scope for this crate — hands the engine before it
//! starts.

use std::collections::BTreeMap;

use flow::ConflictPolicy;

/// One destination address, either a single standalone instance or one
/// seed node of a cluster (the cluster client discovers the rest via
/// topology queries).
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    /// Seed address(es); a single entry is a standalone instance, multiple
    /// entries are alternate seeds for the same cluster.
    pub seeds: Vec<String>,
    /// Destination auth password, if the destination requires one.
    pub password: Option<String>,
}

/// Everything the engine needs to start a replication run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Source host:port.
    pub source_addr: String,
    /// Source auth password, if the source requires one.
    pub source_password: Option<String>,
    /// Whether to negotiate TLS on the source connections.
    pub source_tls: bool,
    /// The port this process advertises via `REPLCONF listening-port`.
    pub listening_port: u16,
    /// The address this process advertises via `REPLCONF ip-address`, if any.
    pub announce_ip: Option<String>,
    /// This process's identifier, sent via `REPLCONF CLIENT-ID`.
    pub client_id: String,
    /// This process's version string, sent via `REPLCONF CLIENT-VERSION`.
    pub client_version: String,
    /// The destination to replicate into.
    pub destination: DestinationConfig,
    /// What the writer does when a key already exists on the destination.
    pub conflict_policy: ConflictPolicy,
    /// Where the checkpoint manager reads and writes its record.
    pub checkpoint_path: std::path::PathBuf,
    /// How often the engine captures and persists a checkpoint.
    pub checkpoint_interval: std::time::Duration,
    /// Per-shard sequence numbers to resume from, if the caller already
    /// has them (bypassing the checkpoint file, e.g. for a manual resume).
    pub initial_shard_lsns: BTreeMap<u32, u64>,
    /// Commands-per-second ceiling across all shards; `None` is unlimited.
    pub qps_ceiling: Option<u32>,
}
