//! crates/flow/src/stats.rs
//!
//! Atomically-maintained counters, readable concurrently without locking
//! the writer's hot path.

use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of [`FlowStats`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStatsSnapshot {
    /// Entries accepted via `enqueue`.
    pub received: u64,
    /// Entries whose commands were acknowledged by the destination.
    pub written: u64,
    /// Entries whose commands the destination rejected or a transport
    /// failure prevented from completing.
    pub failed: u64,
    /// Entries dropped by expiration or a `skip` conflict-policy decision.
    pub skipped: u64,
    /// Pipeline round trips submitted to the destination.
    pub batches: u64,
}

/// The writer's live counters.
#[derive(Debug, Default)]
pub struct FlowStats {
    received: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    batches: AtomicU64,
}

impl FlowStats {
    /// Records one entry accepted into the queue.
    pub fn record_received(&self, count: u64) {
        self.received.fetch_add(count, Ordering::Relaxed);
    }

    /// Records `count` entries that were written successfully.
    pub fn record_written(&self, count: u64) {
        self.written.fetch_add(count, Ordering::Relaxed);
    }

    /// Records `count` entries that failed to write.
    pub fn record_failed(&self, count: u64) {
        self.failed.fetch_add(count, Ordering::Relaxed);
    }

    /// Records `count` entries dropped by expiration or a skip decision.
    pub fn record_skipped(&self, count: u64) {
        self.skipped.fetch_add(count, Ordering::Relaxed);
    }

    /// Records one pipeline round trip submitted to the destination.
    pub fn record_batch(&self) {
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads a consistent-enough snapshot of all counters for metrics
    /// reporting; individual fields may be read at slightly different
    /// instants, which is acceptable for a periodic metrics export.
    #[must_use]
    pub fn snapshot(&self) -> FlowStatsSnapshot {
        FlowStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let stats = FlowStats::default();
        stats.record_received(10);
        stats.record_written(7);
        stats.record_skipped(2);
        stats.record_failed(1);
        stats.record_batch();
        stats.record_batch();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 10);
        assert_eq!(snapshot.written, 7);
        assert_eq!(snapshot.skipped, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.batches, 2);
    }
}
