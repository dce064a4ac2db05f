//! crates/metrics/src/recorder.rs
//!
//! Live counters the engine updates from many concurrent tasks; `snapshot`
//! flattens them into the [`MetricsBatch`] the metrics-flush task reports
//! to the external state store on its timer.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;

use crate::batch::MetricsBatch;
use crate::stage::ShardStage;

#[derive(Default)]
struct ShardCounters {
    imported_keys: AtomicU64,
    lsn_current: AtomicU64,
    lsn_applied: AtomicU64,
    lag_ms: AtomicI64,
    stage: std::sync::atomic::AtomicU8,
}

fn stage_to_u8(stage: ShardStage) -> u8 {
    match stage {
        ShardStage::Connecting => 0,
        ShardStage::Established => 1,
        ShardStage::Rdb => 2,
        ShardStage::RdbDone => 3,
        ShardStage::Journal => 4,
        ShardStage::Error => 5,
    }
}

fn stage_from_u8(value: u8) -> ShardStage {
    match value {
        0 => ShardStage::Connecting,
        1 => ShardStage::Established,
        2 => ShardStage::Rdb,
        3 => ShardStage::RdbDone,
        4 => ShardStage::Journal,
        _ => ShardStage::Error,
    }
}

/// The engine's global and per-shard metric counters.
#[derive(Default)]
pub struct MetricsRecorder {
    source_keys_estimated: AtomicU64,
    target_keys_initial: AtomicU64,
    target_keys_current: AtomicU64,
    total_synced_keys: AtomicU64,
    op_success: AtomicU64,
    op_skipped: AtomicU64,
    op_failed: AtomicU64,
    checkpoint_last_saved_unix: AtomicU64,
    shards: DashMap<u32, ShardCounters>,
}

impl MetricsRecorder {
    /// Builds an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the one-time estimate of the source's key count.
    pub fn set_source_keys_estimated(&self, value: u64) {
        self.source_keys_estimated.store(value, Ordering::Relaxed);
    }

    /// Sets the destination's key count observed before migration began.
    pub fn set_target_keys_initial(&self, value: u64) {
        self.target_keys_initial.store(value, Ordering::Relaxed);
    }

    /// Sets the destination's current key count.
    pub fn set_target_keys_current(&self, value: u64) {
        self.target_keys_current.store(value, Ordering::Relaxed);
    }

    /// Adds `count` to the running total of keys synced across all shards.
    pub fn add_synced_keys(&self, count: u64) {
        self.total_synced_keys.fetch_add(count, Ordering::Relaxed);
    }

    /// Records one successful, skipped, or failed write.
    pub fn record_op(&self, success: u64, skipped: u64, failed: u64) {
        self.op_success.fetch_add(success, Ordering::Relaxed);
        self.op_skipped.fetch_add(skipped, Ordering::Relaxed);
        self.op_failed.fetch_add(failed, Ordering::Relaxed);
    }

    /// Records the unix timestamp of the last successful checkpoint save.
    pub fn set_checkpoint_last_saved_unix(&self, unix_seconds: u64) {
        self.checkpoint_last_saved_unix.store(unix_seconds, Ordering::Relaxed);
    }

    fn shard(&self, shard_index: u32) -> dashmap::mapref::one::RefMut<'_, u32, ShardCounters> {
        self.shards.entry(shard_index).or_default()
    }

    /// Adds `count` to a shard's imported-key counter.
    pub fn add_shard_imported_keys(&self, shard_index: u32, count: u64) {
        self.shard(shard_index).imported_keys.fetch_add(count, Ordering::Relaxed);
    }

    /// Sets a shard's current and last-applied journal sequence numbers.
    pub fn set_shard_lsn(&self, shard_index: u32, current: u64, applied: u64) {
        let counters = self.shard(shard_index);
        counters.lsn_current.store(current, Ordering::Relaxed);
        counters.lsn_applied.store(applied, Ordering::Relaxed);
    }

    /// Sets a shard's replication lag, in milliseconds.
    pub fn set_shard_lag_ms(&self, shard_index: u32, lag_ms: i64) {
        self.shard(shard_index).lag_ms.store(lag_ms, Ordering::Relaxed);
    }

    /// Sets a shard's lifecycle stage label.
    pub fn set_shard_stage(&self, shard_index: u32, stage: ShardStage) {
        self.shard(shard_index).stage.store(stage_to_u8(stage), Ordering::Relaxed);
    }

    /// Reads back a shard's last-recorded LSN, for callers (the checkpoint
    /// task) that need the current value without a full snapshot.
    #[must_use]
    pub fn shard_lsn_current(&self, shard_index: u32) -> u64 {
        self.shards
            .get(&shard_index)
            .map(|counters| counters.lsn_current.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Flattens the recorder's current state into a batch ready for export.
    /// Per-shard values are keyed as `"<metric>.<shard_index>"`.
    #[must_use]
    pub fn snapshot(&self) -> MetricsBatch {
        let mut batch = MetricsBatch::new();
        batch.values.insert(
            "source-keys-estimated".into(),
            self.source_keys_estimated.load(Ordering::Relaxed) as f64,
        );
        batch.values.insert(
            "target-keys-initial".into(),
            self.target_keys_initial.load(Ordering::Relaxed) as f64,
        );
        batch.values.insert(
            "target-keys-current".into(),
            self.target_keys_current.load(Ordering::Relaxed) as f64,
        );
        batch.values.insert(
            "total-synced-keys".into(),
            self.total_synced_keys.load(Ordering::Relaxed) as f64,
        );
        batch.values.insert(
            "op-success".into(),
            self.op_success.load(Ordering::Relaxed) as f64,
        );
        batch.values.insert(
            "op-skipped".into(),
            self.op_skipped.load(Ordering::Relaxed) as f64,
        );
        batch.values.insert(
            "op-failed".into(),
            self.op_failed.load(Ordering::Relaxed) as f64,
        );
        batch.values.insert(
            "checkpoint-last-saved-unix".into(),
            self.checkpoint_last_saved_unix.load(Ordering::Relaxed) as f64,
        );

        for entry in self.shards.iter() {
            let shard_index = *entry.key();
            let counters = entry.value();
            batch.values.insert(
                format!("per-shard-imported-keys.{shard_index}"),
                counters.imported_keys.load(Ordering::Relaxed) as f64,
            );
            batch.values.insert(
                format!("incremental-LSN-current.{shard_index}"),
                counters.lsn_current.load(Ordering::Relaxed) as f64,
            );
            batch.values.insert(
                format!("incremental-LSN-applied.{shard_index}"),
                counters.lsn_applied.load(Ordering::Relaxed) as f64,
            );
            batch.values.insert(
                format!("incremental-lag-ms.{shard_index}"),
                counters.lag_ms.load(Ordering::Relaxed) as f64,
            );
            batch
                .shard_stages
                .insert(shard_index, stage_from_u8(counters.stage.load(Ordering::Relaxed)));
        }

        batch
    }
}
