//! crates/engine/src/transaction.rs
//!
//! The cross-shard transaction rendezvous (§4.7.2): every reader that sees
//! a `COMMAND` frame with `shard_count > 1` joins a shared record keyed by
//! transaction identifier, and exactly one of them executes the command.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineResult};

struct TxRecord {
    /// Gates execution: releases once every participant has arrived.
    execute_barrier: Barrier,
    /// Gates the next transaction: releases once every participant has
    /// observed that execution completed.
    release_barrier: Barrier,
    /// Counts down to zero; whoever drives it there removes the record.
    remaining: AtomicUsize,
}

impl TxRecord {
    fn new(shard_count: usize) -> Self {
        Self {
            execute_barrier: Barrier::new(shard_count),
            release_barrier: Barrier::new(shard_count),
            remaining: AtomicUsize::new(shard_count),
        }
    }
}

/// The shared map backing every in-flight cross-shard transaction.
#[derive(Default)]
pub struct TransactionRegistry {
    records: DashMap<u64, Arc<TxRecord>>,
}

impl TransactionRegistry {
    /// Builds an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins (or creates) the rendezvous record for `txid`, waits for every
    /// one of `shard_count` participants to arrive, runs `execute` on
    /// exactly one of them, then waits for every participant to observe
    /// that before returning.
    ///
    /// Cancellation during either wait returns `Err(EngineError::Cancelled)`
    /// immediately, without running `execute` and without decrementing the
    /// release counter.
    pub async fn rendezvous<F, Fut>(
        &self,
        txid: u64,
        shard_count: usize,
        cancel: &CancellationToken,
        execute: F,
    ) -> EngineResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineResult<()>>,
    {
        let (record, is_inserter) = match self.records.entry(txid) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let record = Arc::new(TxRecord::new(shard_count));
                entry.insert(record.clone());
                (record, true)
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            _ = record.execute_barrier.wait() => {}
        }

        if is_inserter {
            execute().await?;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            _ = record.release_barrier.wait() => {}
        }

        if record.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.records.remove(&txid);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[tokio::test]
    async fn exactly_one_participant_executes() {
        let registry = Arc::new(TransactionRegistry::new());
        let executions = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let registry = registry.clone();
            let executions = executions.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .rendezvous(77, 3, &cancel, || async {
                        executions.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);
        assert!(registry.records.is_empty());
    }

    #[tokio::test]
    async fn a_missing_participant_blocks_the_others_until_cancelled() {
        let registry = Arc::new(TransactionRegistry::new());
        let cancel = CancellationToken::new();

        let registry2 = registry.clone();
        let cancel2 = cancel.clone();
        let lone = tokio::spawn(async move {
            registry2
                .rendezvous(1, 2, &cancel2, || async { Ok(()) })
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!lone.is_finished());

        cancel.cancel();
        let result = lone.await.unwrap();
        assert!(matches!(result, Err(EngineError::Cancelled)));
    }
}
