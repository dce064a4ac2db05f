//! crates/engine/src/barrier.rs
//!
//! The global full-sync barrier (§4.7 point 3): every shard's reader
//! reports snapshot completion once, and the engine's main task waits for
//! all N reports before issuing the stable-sync transition command.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Tracks snapshot completion across every shard and releases waiters
/// exactly once, when the last shard reports in.
pub struct FullSyncBarrier {
    remaining: AtomicUsize,
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl FullSyncBarrier {
    /// Builds a barrier expecting `shard_count` reports.
    #[must_use]
    pub fn new(shard_count: usize) -> Self {
        let (tx, rx) = watch::channel(shard_count == 0);
        Self {
            remaining: AtomicUsize::new(shard_count),
            tx,
            rx,
        }
    }

    /// Reports one shard's snapshot completion. The last caller to arrive
    /// releases every waiter.
    pub fn complete_one(&self) {
        let previous = self.remaining.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
            Some(n.saturating_sub(1))
        });
        if let Ok(1) = previous {
            let _ = self.tx.send(true);
        }
    }

    /// Waits until every shard has reported, or `cancel` fires first.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return true;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            result = rx.wait_for(|released| *released) => result.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn releases_only_after_every_shard_reports() {
        let barrier = FullSyncBarrier::new(3);
        let cancel = CancellationToken::new();

        barrier.complete_one();
        barrier.complete_one();

        let waited = tokio::time::timeout(std::time::Duration::from_millis(20), barrier.wait(&cancel)).await;
        assert!(waited.is_err(), "barrier released before the third report");

        barrier.complete_one();
        assert!(barrier.wait(&cancel).await);
    }

    #[tokio::test]
    async fn zero_shards_releases_immediately() {
        let barrier = FullSyncBarrier::new(0);
        let cancel = CancellationToken::new();
        assert!(barrier.wait(&cancel).await);
    }

    #[tokio::test]
    async fn cancellation_unblocks_a_waiter_without_releasing_the_barrier() {
        let barrier = FullSyncBarrier::new(1);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!barrier.wait(&cancel).await);
    }
}
