//! crates/engine/src/checkpoint_task.rs
//!
//! On a timer (§4.9), captures each shard's latest LSN into a
//! [`CheckpointRecord`] and persists it. Also runs once more on graceful
//! shutdown so the file on disk reflects the highest LSN actually applied,
//! per the testable invariant in §8.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use checkpoint::{CheckpointManager, CheckpointRecord};
use handshake::SessionDescriptor;
use metrics::MetricsRecorder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn capture(session: &SessionDescriptor, metrics: &MetricsRecorder, shard_indices: &[u32]) -> CheckpointRecord {
    let mut shard_lsns = BTreeMap::new();
    for &shard in shard_indices {
        shard_lsns.insert(shard, metrics.shard_lsn_current(shard));
    }
    CheckpointRecord {
        repl_id: session.repl_id.clone(),
        session_id: session.session_id.clone(),
        shard_lsns,
        saved_at_unix: now_unix(),
    }
}

fn save(manager: &CheckpointManager, metrics: &MetricsRecorder, record: &CheckpointRecord) {
    match manager.save(record) {
        Ok(()) => metrics.set_checkpoint_last_saved_unix(record.saved_at_unix),
        Err(err) => warn!(error = %err, "checkpoint save failed; run continues without a fresh checkpoint"),
    }
}

/// Runs the periodic checkpoint loop until `cancel` fires, then captures
/// and saves once more before returning.
pub async fn run_checkpoint_task(
    manager: Arc<CheckpointManager>,
    metrics: Arc<MetricsRecorder>,
    session: SessionDescriptor,
    shard_indices: Vec<u32>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately; skip it so interval starts the clock

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let record = capture(&session, &metrics, &shard_indices);
                save(&manager, &metrics, &record);
                debug!(shards = shard_indices.len(), "periodic checkpoint saved");
            }
        }
    }

    let record = capture(&session, &metrics, &shard_indices);
    save(&manager, &metrics, &record);
    debug!("final checkpoint saved on shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_every_configured_shards_latest_lsn() {
        let metrics = Arc::new(MetricsRecorder::new());
        metrics.set_shard_lsn(0, 10, 10);
        metrics.set_shard_lsn(1, 20, 20);
        let session = SessionDescriptor {
            repl_id: b"r".to_vec(),
            session_id: "S".to_string(),
            shard_count: 2,
            version: 4,
        };

        let record = capture(&session, &metrics, &[0, 1]);
        assert_eq!(record.shard_lsns[&0], 10);
        assert_eq!(record.shard_lsns[&1], 20);
    }
}
