//! crates/engine/src/replay.rs
//!
//! Command replay dispatch (§4.7.1): what a shard's reader does with each
//! journal frame once it has transitioned to stable sync (or seen one
//! inline, mid-snapshot).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use cluster::ClusterClient;
use journal::{CommandPayload, JournalEntry};
use metrics::MetricsRecorder;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::EngineResult;
use crate::transaction::TransactionRegistry;

/// Source commands that reset state across every shard at once; these
/// always rendezvous even if a single frame happens to carry
/// `shard_count == 1`, since the source is free to fan them out however it
/// likes.
const GLOBAL_COMMANDS: &[&str] = &["FLUSHDB", "FLUSHALL"];

fn is_global_command(name: &[u8]) -> bool {
    GLOBAL_COMMANDS
        .iter()
        .any(|candidate| name.eq_ignore_ascii_case(candidate.as_bytes()))
}

/// Per-shard state the replay path needs across calls: whether `SELECT` is
/// meaningful (it isn't against a cluster destination, which only has
/// database 0), and this shard's latest observed sequence number.
pub struct ReplayContext {
    shard_index: u32,
    is_cluster: bool,
    current_db: AtomicU32,
    cluster: Arc<ClusterClient>,
    transactions: Arc<TransactionRegistry>,
    metrics: Arc<MetricsRecorder>,
    cancel: CancellationToken,
}

impl ReplayContext {
    /// Builds a fresh context for one shard.
    #[must_use]
    pub fn new(
        shard_index: u32,
        is_cluster: bool,
        cluster: Arc<ClusterClient>,
        transactions: Arc<TransactionRegistry>,
        metrics: Arc<MetricsRecorder>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            shard_index,
            is_cluster,
            current_db: AtomicU32::new(0),
            cluster,
            transactions,
            metrics,
            cancel,
        }
    }

    /// Dispatches one journal frame. Per-command write failures are
    /// counted and logged, never returned; only cancellation propagates as
    /// an error, since it means the caller should stop reading altogether.
    pub async fn replay(&self, entry: JournalEntry) -> EngineResult<()> {
        match entry {
            JournalEntry::Noop | JournalEntry::Ping => Ok(()),
            JournalEntry::Select(db) => {
                if !self.is_cluster {
                    self.current_db.store(db, Ordering::Relaxed);
                }
                Ok(())
            }
            JournalEntry::Lsn(lsn) => {
                self.metrics.set_shard_lsn(self.shard_index, lsn, lsn);
                Ok(())
            }
            JournalEntry::Expired(payload) => {
                self.replay_expired(&payload).await;
                Ok(())
            }
            JournalEntry::Command(payload) => self.replay_command(payload).await,
        }
    }

    async fn replay_expired(&self, payload: &CommandPayload) {
        let Some(key) = payload.args.first() else {
            warn!(shard = self.shard_index, "EXPIRED frame carried no key");
            return;
        };
        match self.cluster.do_cmd("PEXPIRE", &[key.as_slice(), b"1"]).await {
            Ok(_) => self.metrics.record_op(1, 0, 0),
            Err(err) => {
                warn!(error = %err, shard = self.shard_index, "failed to replay an EXPIRED frame");
                self.metrics.record_op(0, 0, 1);
            }
        }
    }

    async fn replay_command(&self, payload: CommandPayload) -> EngineResult<()> {
        let rendezvous_needed = payload.shard_count > 1 || is_global_command(&payload.name);
        if !rendezvous_needed {
            self.run_and_record(&payload).await;
            return Ok(());
        }

        let cluster = self.cluster.clone();
        let metrics = self.metrics.clone();
        let shard_index = self.shard_index;
        self.transactions
            .rendezvous(payload.txid, payload.shard_count as usize, &self.cancel, move || {
                let payload = payload.clone();
                async move {
                    match run_command(&cluster, &payload).await {
                        Ok(_) => metrics.record_op(1, 0, 0),
                        Err(err) => {
                            warn!(
                                error = %err,
                                shard = shard_index,
                                txid = payload.txid,
                                "failed to replay a cross-shard command"
                            );
                            metrics.record_op(0, 0, 1);
                        }
                    }
                    Ok(())
                }
            })
            .await
    }

    async fn run_and_record(&self, payload: &CommandPayload) {
        match run_command(&self.cluster, payload).await {
            Ok(_) => self.metrics.record_op(1, 0, 0),
            Err(err) => {
                warn!(error = %err, shard = self.shard_index, "failed to replay a command");
                self.metrics.record_op(0, 0, 1);
            }
        }
    }
}

async fn run_command(cluster: &ClusterClient, payload: &CommandPayload) -> cluster::ClusterResult<wire::Reply> {
    let name = String::from_utf8_lossy(&payload.name).into_owned();
    let args: Vec<&[u8]> = payload.args.iter().map(Vec::as_slice).collect();
    cluster.do_cmd(&name, &args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_the_global_command_set_case_insensitively() {
        assert!(is_global_command(b"flushall"));
        assert!(is_global_command(b"FLUSHDB"));
        assert!(!is_global_command(b"SET"));
    }
}
