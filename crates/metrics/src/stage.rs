//! crates/metrics/src/stage.rs

use serde::{Deserialize, Serialize};

/// The lifecycle stage label reported for one shard, per §6's outbound
/// metrics contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStage {
    /// The flow connection is being opened.
    Connecting,
    /// The flow connection is registered and awaiting the sync trigger.
    Established,
    /// The shard is streaming its initial RDB snapshot.
    Rdb,
    /// The shard's snapshot finished; awaiting the stable-sync transition.
    RdbDone,
    /// The shard is replaying journal entries.
    Journal,
    /// The shard's reader or writer stopped on a fatal error.
    Error,
}

impl ShardStage {
    /// The label string reported to the state store.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Established => "established",
            Self::Rdb => "rdb",
            Self::RdbDone => "rdb_done",
            Self::Journal => "journal",
            Self::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_the_contract_strings() {
        assert_eq!(ShardStage::RdbDone.label(), "rdb_done");
        assert_eq!(ShardStage::Rdb.label(), "rdb");
    }
}
