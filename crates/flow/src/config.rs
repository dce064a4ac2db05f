//! crates/flow/src/config.rs

use std::time::Duration;

/// What the writer does when a key it is about to write already exists on
/// the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Write unconditionally, without checking for an existing key.
    Overwrite,
    /// Check first; if the key exists, drop the entry and count it skipped.
    Skip,
    /// Check first; if the key exists, stop the shard with a fatal error.
    Panic,
}

/// The most commands a single pipeline round-trip carries, regardless of
/// how large its group is.
pub const MAX_PIPELINE_CHUNK: usize = 500;

/// Tuning knobs for one shard's [`crate::FlowWriter`].
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// How entries that already exist on the destination are handled.
    pub conflict_policy: ConflictPolicy,
    /// Entries accumulated before a batch is submitted, even if the flush
    /// interval has not elapsed.
    pub batch_size: usize,
    /// Submits a partial batch after this much time has passed since the
    /// last flush, even if `batch_size` has not been reached.
    pub flush_interval: Duration,
    /// Capacity of the inbound channel; `enqueue` blocks once full.
    pub queue_capacity: usize,
    /// Maximum number of batches this shard may have submitted to the
    /// destination concurrently.
    pub max_in_flight_batches: usize,
    /// Commands per second the writer may issue; `None` means unlimited.
    pub rate_limit_qps: Option<u32>,
}

impl FlowConfig {
    /// Computes the per-shard in-flight batch budget described in §4.8's
    /// backpressure policy: a global budget partitioned across shards and
    /// clamped to `[20, 50]`, or `standalone_budget` when there is only one
    /// destination node to serialize against.
    #[must_use]
    pub fn in_flight_budget(shard_count: usize, is_cluster: bool) -> usize {
        const GLOBAL_BUDGET: usize = 400;
        const STANDALONE_BUDGET: usize = 64;
        const MIN_PER_SHARD: usize = 20;
        const MAX_PER_SHARD: usize = 50;

        if !is_cluster {
            return STANDALONE_BUDGET;
        }
        let shard_count = shard_count.max(1);
        (GLOBAL_BUDGET / shard_count).clamp(MIN_PER_SHARD, MAX_PER_SHARD)
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::Overwrite,
            batch_size: 1000,
            flush_interval: Duration::from_millis(50),
            queue_capacity: 1_000_000,
            max_in_flight_batches: 32,
            rate_limit_qps: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_budget_is_clamped_to_the_floor_with_many_shards() {
        assert_eq!(FlowConfig::in_flight_budget(64, true), 20);
    }

    #[test]
    fn cluster_budget_is_clamped_to_the_ceiling_with_few_shards() {
        assert_eq!(FlowConfig::in_flight_budget(1, true), 50);
    }

    #[test]
    fn standalone_uses_its_own_fixed_budget() {
        assert_eq!(FlowConfig::in_flight_budget(8, false), 64);
    }
}
