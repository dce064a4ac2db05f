//! crates/engine/src/reader.rs
//!
//! One reader per shard, per §4.7 points 1-5. The snapshot and journal
//! codecs are synchronous, so the actual decoding runs on a blocking-pool
//! thread; it forwards what it decodes to this module's async driver
//! through a channel, which is the only place that touches the flow
//! writer, the replay context, or the full-sync barrier.

use std::io::Read;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use handshake::SyncKind;
use journal::JournalEntry;
use rdb::{RdbEntry, RdbEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wire::ShutdownHandle;

use crate::barrier::FullSyncBarrier;
use crate::error::{EngineError, EngineResult};
use crate::replay::ReplayContext;
use flow::FlowWriter;
use metrics::{MetricsRecorder, ShardStage};

/// One unit of work crossing from the blocking decode thread to the async
/// driver.
enum ShardMessage {
    Entry(RdbEntry),
    Journal(JournalEntry),
    SnapshotComplete,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Runs one shard's reader to completion: full sync, then stable sync,
/// until the connection closes or `cancel` fires.
///
/// `go_stable` is signaled by the engine's main task once `STARTSTABLE` has
/// returned `OK` on the control connection; the decode thread blocks on it
/// after the snapshot's `0xFF` marker before reading the trailing 40-byte
/// token and switching to the journal codec, per §4.7 point 5. A shard
/// registered as [`SyncKind::Partial`] has no snapshot body at all and
/// ignores `go_stable`, going straight to journal frames.
pub async fn run_shard_reader(
    shard_index: u32,
    sync_kind: SyncKind,
    source: impl Read + Send + 'static,
    shutdown: ShutdownHandle,
    writer: Arc<FlowWriter>,
    replay: Arc<ReplayContext>,
    barrier: Arc<FullSyncBarrier>,
    metrics: Arc<MetricsRecorder>,
    go_stable: std::sync::mpsc::Receiver<()>,
    cancel: CancellationToken,
) -> EngineResult<()> {
    let (tx, mut rx) = mpsc::channel(1024);
    let decode_task =
        tokio::task::spawn_blocking(move || decode_shard_sync(sync_kind, source, tx, go_stable));

    metrics.set_shard_stage(shard_index, ShardStage::Rdb);
    let mut shutdown_requested = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // The blocking decode thread has no way to observe this
                // token; closing its socket is what actually unblocks it.
                shutdown_requested = true;
                shutdown.shutdown();
                break;
            }
            message = rx.recv() => {
                match message {
                    Some(ShardMessage::Entry(entry)) => {
                        if entry.is_expired_at(now_ms()) {
                            continue;
                        }
                        metrics.add_shard_imported_keys(shard_index, 1);
                        if writer.enqueue(entry).await.is_err() {
                            warn!(shard = shard_index, "flow writer closed its queue; stopping reader");
                            break;
                        }
                    }
                    Some(ShardMessage::Journal(frame)) => {
                        if let Err(EngineError::Cancelled) = replay.replay(frame).await {
                            break;
                        }
                    }
                    Some(ShardMessage::SnapshotComplete) => {
                        metrics.set_shard_stage(shard_index, ShardStage::RdbDone);
                        barrier.complete_one();
                    }
                    None => break,
                }
            }
        }
    }

    metrics.set_shard_stage(shard_index, ShardStage::Journal);
    info!(shard = shard_index, "reader loop exited");

    match decode_task.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) if shutdown_requested => Ok(()),
        Ok(Err(err)) => {
            metrics.set_shard_stage(shard_index, ShardStage::Error);
            Err(err)
        }
        Err(join_err) => {
            metrics.set_shard_stage(shard_index, ShardStage::Error);
            Err(EngineError::Transport(format!("decode task panicked: {join_err}")))
        }
    }
}

fn decode_shard_sync(
    sync_kind: SyncKind,
    source: impl Read,
    tx: mpsc::Sender<ShardMessage>,
    go_stable: std::sync::mpsc::Receiver<()>,
) -> EngineResult<()> {
    // A partial-sync registration means the source skips the snapshot
    // entirely and streams the journal starting at the resume LSN; there is
    // no RDB body and no trailing end-of-file token to wait for.
    if sync_kind == SyncKind::Partial {
        if tx.blocking_send(ShardMessage::SnapshotComplete).is_err() {
            return Ok(());
        }
        let mut journal_reader = decode::Reader::new(source);
        loop {
            match journal::decode_frame(&mut journal_reader) {
                Ok(frame) => {
                    if tx.blocking_send(ShardMessage::Journal(frame)).is_err() {
                        return Ok(());
                    }
                }
                Err(journal::JournalError::Decode(decode::DecodeError::Io(_))) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
        }
    }

    let mut decoder = rdb::Decoder::new(source);

    loop {
        match decoder.next_event()? {
            RdbEvent::Entry(entry) => {
                if tx.blocking_send(ShardMessage::Entry(entry)).is_err() {
                    return Ok(());
                }
            }
            RdbEvent::InlineJournal(frame) => {
                if tx.blocking_send(ShardMessage::Journal(frame)).is_err() {
                    return Ok(());
                }
            }
            RdbEvent::SnapshotComplete => {
                if tx.blocking_send(ShardMessage::SnapshotComplete).is_err() {
                    return Ok(());
                }
            }
            RdbEvent::Eof => break,
        }
    }

    // The engine's main task has not yet sent STARTSTABLE; wait for it
    // before consuming the trailing end-of-file marker, or stop quietly if
    // the engine shut down first.
    if go_stable.recv().is_err() {
        return Ok(());
    }

    let mut raw = decoder.into_inner();
    let mut eof_token = [0u8; 40];
    raw.read_exact(&mut eof_token)
        .map_err(|err| EngineError::from(rdb::RdbError::Decode(decode::DecodeError::Io(err))))?;

    let mut journal_reader = decode::Reader::new(raw);
    loop {
        match journal::decode_frame(&mut journal_reader) {
            Ok(frame) => {
                if tx.blocking_send(ShardMessage::Journal(frame)).is_err() {
                    return Ok(());
                }
            }
            Err(journal::JournalError::Decode(decode::DecodeError::Io(_))) => return Ok(()),
            Err(err) => return Err(err.into()),
        }
    }
}
