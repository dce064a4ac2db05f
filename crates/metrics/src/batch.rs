//! crates/metrics/src/batch.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stage::ShardStage;

/// One periodic emission to the external state store: the named numeric
/// metrics plus each shard's current stage label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBatch {
    /// Named numeric metrics, e.g. `total-synced-keys`.
    pub values: BTreeMap<String, f64>,
    /// Each shard's current lifecycle stage.
    pub shard_stages: BTreeMap<u32, ShardStage>,
}

impl MetricsBatch {
    /// An empty batch, useful as a starting point for incremental builders.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            shard_stages: BTreeMap::new(),
        }
    }
}

impl Default for MetricsBatch {
    fn default() -> Self {
        Self::new()
    }
}
