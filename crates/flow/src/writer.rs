//! crates/flow/src/writer.rs
//!
//! One instance per shard. Accumulates entries into batches, groups each
//! batch by destination node, and submits pipelined writes through a
//! bounded pool of in-flight batch tasks, per §4.8.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use cluster::ClusterClient;
use rdb::RdbEntry;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::{ConflictPolicy, FlowConfig, MAX_PIPELINE_CHUNK};
use crate::conflict::{self, Disposition};
use crate::error::FlowError;
use crate::rate_limiter::RateLimiter;
use crate::stats::{FlowStats, FlowStatsSnapshot};
use crate::translate::translate;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The batching, grouping, and pipelined-write engine for one shard.
pub struct FlowWriter {
    sender: mpsc::Sender<RdbEntry>,
    stats: Arc<FlowStats>,
    fatal_conflict: Arc<OnceLock<Vec<u8>>>,
    task: tokio::task::JoinHandle<()>,
}

impl FlowWriter {
    /// Spawns the writer's background batching loop.
    #[must_use]
    pub fn spawn(cluster: Arc<ClusterClient>, config: FlowConfig, cancel: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let stats = Arc::new(FlowStats::default());
        let rate_limiter = Arc::new(match config.rate_limit_qps {
            Some(qps) => RateLimiter::new(qps),
            None => RateLimiter::unlimited(),
        });
        let semaphore = Arc::new(Semaphore::new(config.max_in_flight_batches));
        let fatal_conflict = Arc::new(OnceLock::new());

        let task = tokio::spawn(run_batch_loop(
            receiver,
            cluster,
            config,
            stats.clone(),
            rate_limiter,
            semaphore,
            fatal_conflict.clone(),
            cancel,
        ));

        Self {
            sender,
            stats,
            fatal_conflict,
            task,
        }
    }

    /// Enqueues one decoded entry, blocking if the inbound queue is full.
    pub async fn enqueue(&self, entry: RdbEntry) -> Result<(), RdbEntry> {
        self.stats.record_received(1);
        self.sender.send(entry).await.map_err(|e| e.0)
    }

    /// Returns a consistent-enough snapshot of this writer's counters.
    #[must_use]
    pub fn stats(&self) -> FlowStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the `panic` conflict that stopped this shard's writer, if
    /// one occurred. Set at most once; the writer keeps running its batch
    /// loop until the engine observes the cancellation this triggers and
    /// calls [`FlowWriter::shutdown`].
    #[must_use]
    pub fn take_fatal_error(&self) -> Option<FlowError> {
        self.fatal_conflict.get().cloned().map(FlowError::Conflict)
    }

    /// Drops the sender half so the batch loop drains and exits once its
    /// queue empties, then waits for it to finish.
    pub async fn shutdown(self) {
        drop(self.sender);
        let _ = self.task.await;
    }
}

async fn run_batch_loop(
    mut receiver: mpsc::Receiver<RdbEntry>,
    cluster: Arc<ClusterClient>,
    config: FlowConfig,
    stats: Arc<FlowStats>,
    rate_limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    fatal: Arc<OnceLock<Vec<u8>>>,
    cancel: CancellationToken,
) {
    let mut batch = Vec::with_capacity(config.batch_size);
    let mut flush = tokio::time::interval(config.flush_interval);
    flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                break;
            }
            entry = receiver.recv() => {
                match entry {
                    Some(entry) => {
                        batch.push(entry);
                        if batch.len() >= config.batch_size {
                            submit(&mut batch, &cluster, &config, &stats, &rate_limiter, &semaphore, &fatal, &cancel).await;
                        }
                    }
                    None => {
                        if !batch.is_empty() {
                            submit(&mut batch, &cluster, &config, &stats, &rate_limiter, &semaphore, &fatal, &cancel).await;
                        }
                        break;
                    }
                }
            }
            _ = flush.tick() => {
                if !batch.is_empty() {
                    submit(&mut batch, &cluster, &config, &stats, &rate_limiter, &semaphore, &fatal, &cancel).await;
                }
            }
        }
    }
}

async fn submit(
    batch: &mut Vec<RdbEntry>,
    cluster: &Arc<ClusterClient>,
    config: &FlowConfig,
    stats: &Arc<FlowStats>,
    rate_limiter: &Arc<RateLimiter>,
    semaphore: &Arc<Semaphore>,
    fatal: &Arc<OnceLock<Vec<u8>>>,
    cancel: &CancellationToken,
) {
    let entries = std::mem::replace(batch, Vec::with_capacity(config.batch_size));
    let cluster = cluster.clone();
    let config = config.clone();
    let stats = stats.clone();
    let rate_limiter = rate_limiter.clone();
    let semaphore = semaphore.clone();
    let fatal = fatal.clone();
    let cancel = cancel.clone();

    tokio::spawn(async move {
        let _permit = match semaphore.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        process_batch(entries, &cluster, &config, &stats, &rate_limiter, &fatal, &cancel).await;
    });
}

/// Groups `entries` by destination node, applies the conflict policy,
/// translates each surviving entry, and pipelines the resulting commands
/// in chunks of at most [`MAX_PIPELINE_CHUNK`].
async fn process_batch(
    entries: Vec<RdbEntry>,
    cluster: &ClusterClient,
    config: &FlowConfig,
    stats: &Arc<FlowStats>,
    rate_limiter: &RateLimiter,
    fatal: &Arc<OnceLock<Vec<u8>>>,
    cancel: &CancellationToken,
) {
    let now = now_ms();
    let mut groups: HashMap<String, Vec<RdbEntry>> = HashMap::new();

    for entry in entries {
        if entry.is_expired_at(now) {
            stats.record_skipped(1);
            continue;
        }
        let node = match cluster.node_for_key(&entry.key) {
            Ok(node) => node,
            Err(err) => {
                warn!(error = %err, "could not resolve destination node for key; dropping entry");
                stats.record_failed(1);
                continue;
            }
        };
        groups.entry(node).or_default().push(entry);
    }

    for (node, group) in groups {
        if fatal.get().is_some() {
            stats.record_failed(group.len() as u64);
            continue;
        }
        write_group(&node, group, cluster, config, stats, rate_limiter, fatal, cancel, now).await;
    }
}

async fn write_group(
    node: &str,
    group: Vec<RdbEntry>,
    cluster: &ClusterClient,
    config: &FlowConfig,
    stats: &Arc<FlowStats>,
    rate_limiter: &RateLimiter,
    fatal: &Arc<OnceLock<Vec<u8>>>,
    cancel: &CancellationToken,
    now: u64,
) {
    let mut commands: Vec<(&'static str, Vec<Vec<u8>>)> = Vec::new();
    let mut surviving = 0u64;

    for entry in &group {
        let disposition = match conflict::evaluate(cluster, config.conflict_policy, &entry.key).await {
            Ok(d) => d,
            Err(FlowError::Conflict(key)) => {
                warn!(key = ?key, "conflict policy `panic` triggered; stopping shard");
                stats.record_failed(group.len() as u64 - surviving);
                let _ = fatal.set(key);
                cancel.cancel();
                return;
            }
            Err(err) => {
                warn!(error = %err, "destination error while checking for a conflict");
                stats.record_failed(1);
                continue;
            }
        };
        if disposition == Disposition::Skip {
            stats.record_skipped(1);
            continue;
        }
        surviving += 1;
        commands.extend(translate(entry, now));
    }

    for chunk in commands.chunks(MAX_PIPELINE_CHUNK) {
        rate_limiter.acquire(chunk.len() as u64).await;
        let owned: Vec<(&str, Vec<&[u8]>)> = chunk
            .iter()
            .map(|(name, args)| (*name, args.iter().map(Vec::as_slice).collect()))
            .collect();

        match cluster.pipeline_for_node(node, &owned).await {
            Ok(replies) => {
                let failed = replies.iter().filter(|r| r.as_error().is_some()).count() as u64;
                stats.record_written(replies.len() as u64 - failed);
                stats.record_failed(failed);
                stats.record_batch();
            }
            Err(err) => {
                warn!(error = %err, node, "pipeline submission failed");
                stats.record_failed(chunk.len() as u64);
            }
        }
    }
}
