//! crates/engine/src/engine.rs
//!
//! The main orchestrator: drives the handshake, spawns one reader and one
//! writer per shard, waits for the full-sync barrier, issues the
//! stable-sync transition, and runs the checkpoint and metrics tasks
//! alongside them until cancelled (§4.7, §5).

use std::collections::BTreeMap;
use std::sync::Arc;

use checkpoint::{CheckpointManager, CheckpointRecord};
use cluster::ClusterClient;
use contracts::{EngineConfig, LogLevel, LogSink, StateSink};
use flow::{FlowConfig, FlowWriter};
use handshake::HandshakeController;
use metrics::{MetricsRecorder, ShardStage};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::barrier::FullSyncBarrier;
use crate::checkpoint_task::run_checkpoint_task;
use crate::error::{EngineError, EngineResult};
use crate::metrics_task::run_metrics_task;
use crate::reader::run_shard_reader;
use crate::replay::ReplayContext;
use crate::transaction::TransactionRegistry;

/// How often the metrics-flush task reports to the [`StateSink`].
const METRICS_FLUSH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

/// One replication run's shared state: the destination client, the
/// checkpoint file, and the live counters. Built once, consumed by [`run`].
pub struct Engine {
    config: EngineConfig,
    cluster: Arc<ClusterClient>,
    checkpoint_manager: Arc<CheckpointManager>,
    metrics: Arc<MetricsRecorder>,
    transactions: Arc<TransactionRegistry>,
}

impl Engine {
    /// Connects to the destination and builds an idle engine ready to run.
    pub async fn new(config: EngineConfig) -> EngineResult<Self> {
        let seed = config
            .destination
            .seeds
            .first()
            .ok_or_else(|| EngineError::FatalConfig("destination seed list is empty".into()))?;
        let cluster = ClusterClient::connect(seed).await?;

        Ok(Self {
            config,
            cluster: Arc::new(cluster),
            checkpoint_manager: Arc::new(CheckpointManager::new("")), // replaced below
            metrics: Arc::new(MetricsRecorder::new()),
            transactions: Arc::new(TransactionRegistry::new()),
        })
    }

    /// Runs the replication session to completion: handshake, full sync,
    /// stable sync, until `cancel` fires or a fatal error occurs.
    pub async fn run(
        mut self,
        state_sink: Arc<dyn StateSink>,
        log_sink: Arc<dyn LogSink>,
        cancel: CancellationToken,
    ) -> EngineResult<()> {
        self.checkpoint_manager = Arc::new(CheckpointManager::new(self.config.checkpoint_path.clone()));

        let checkpoint = self.checkpoint_manager.load().unwrap_or_else(|err| {
            warn!(error = %err, "could not read checkpoint file; starting from a full sync");
            None
        });

        let (mut controller, session) = HandshakeController::handshake(
            &self.config.source_addr,
            self.config.source_password.as_deref(),
            self.config.listening_port,
            self.config.announce_ip.as_deref(),
            &self.config.client_id,
            &self.config.client_version,
        )
        .await?;

        log_sink
            .log(
                LogLevel::Info,
                &format!(
                    "negotiated session {} with {} shard(s)",
                    session.session_id, session.shard_count
                ),
            )
            .await;

        let resume_lsns = resolve_resume_lsns(&checkpoint, &session, &self.config.initial_shard_lsns);

        let mut flows = Vec::with_capacity(session.shard_count as usize);
        for shard_index in 0..session.shard_count {
            let resume = resume_lsns.get(&shard_index).copied();
            let flow = controller
                .register_flow(
                    &self.config.source_addr,
                    self.config.source_password.as_deref(),
                    &session,
                    shard_index,
                    resume,
                )
                .await?;
            self.metrics.set_shard_stage(shard_index, ShardStage::Established);
            flows.push(flow);
        }

        controller.trigger_sync(&session).await?;

        let is_cluster = self.cluster.is_cluster();
        let flow_config = self.build_flow_config(session.shard_count as usize, is_cluster);
        let barrier = Arc::new(FullSyncBarrier::new(session.shard_count as usize));

        let mut writers = Vec::with_capacity(flows.len());
        let mut reader_handles = Vec::with_capacity(flows.len());
        let mut stable_senders = Vec::with_capacity(flows.len());

        for flow in flows {
            let shard_index = flow.shard_index;
            let sync_kind = flow.sync_kind;
            let writer = Arc::new(FlowWriter::spawn(self.cluster.clone(), flow_config.clone(), cancel.clone()));
            let replay_ctx = Arc::new(ReplayContext::new(
                shard_index,
                is_cluster,
                self.cluster.clone(),
                self.transactions.clone(),
                self.metrics.clone(),
                cancel.clone(),
            ));

            let (stable_tx, stable_rx) = std::sync::mpsc::channel();
            let (sync_reader, shutdown_handle) = flow.client.into_sync_reader()?;

            reader_handles.push(tokio::spawn(run_shard_reader(
                shard_index,
                sync_kind,
                sync_reader,
                shutdown_handle,
                writer.clone(),
                replay_ctx,
                barrier.clone(),
                self.metrics.clone(),
                stable_rx,
                cancel.clone(),
            )));
            stable_senders.push(stable_tx);
            writers.push(writer);
        }

        if barrier.wait(&cancel).await {
            info!("full-sync barrier released; issuing the stable-sync transition");
            controller.start_stable_sync(&session).await?;
            log_sink.log(LogLevel::Info, "stable-sync transition complete").await;
            for tx in &stable_senders {
                let _ = tx.send(());
            }
        } else {
            info!("cancelled before every shard finished its snapshot");
        }
        drop(stable_senders);

        let checkpoint_handle = tokio::spawn(run_checkpoint_task(
            self.checkpoint_manager.clone(),
            self.metrics.clone(),
            session.clone(),
            (0..session.shard_count).collect(),
            self.config.checkpoint_interval,
            cancel.clone(),
        ));
        let metrics_handle = tokio::spawn(run_metrics_task(
            self.metrics.clone(),
            state_sink,
            METRICS_FLUSH_INTERVAL,
            cancel.clone(),
        ));

        cancel.cancelled().await;

        let mut first_error = None;
        for handle in reader_handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(error = %err, "shard reader ended with an error");
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    warn!(error = %join_err, "shard reader task panicked");
                }
            }
        }

        for writer in writers {
            if first_error.is_none() {
                if let Some(err) = writer.take_fatal_error() {
                    warn!(error = %err, "flow writer reported a fatal conflict");
                    first_error.get_or_insert(EngineError::from(err));
                }
            }
            if let Ok(writer) = Arc::try_unwrap(writer) {
                writer.shutdown().await;
            }
        }

        let _ = checkpoint_handle.await;
        let _ = metrics_handle.await;
        log_sink.log(LogLevel::Info, "replication run stopped").await;

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn build_flow_config(&self, shard_count: usize, is_cluster: bool) -> FlowConfig {
        let mut flow_config = FlowConfig {
            conflict_policy: self.config.conflict_policy,
            rate_limit_qps: self.config.qps_ceiling,
            max_in_flight_batches: FlowConfig::in_flight_budget(shard_count, is_cluster),
            ..FlowConfig::default()
        };
        if flow_config.rate_limit_qps == Some(0) {
            flow_config.rate_limit_qps = None;
        }
        flow_config
    }
}

/// Decides each shard's resume point: a matching checkpoint wins, a
/// caller-supplied override is the fallback, and no entry means a full
/// sync for that shard.
fn resolve_resume_lsns(
    checkpoint: &Option<CheckpointRecord>,
    session: &handshake::SessionDescriptor,
    overrides: &BTreeMap<u32, u64>,
) -> BTreeMap<u32, u64> {
    match checkpoint {
        Some(record) if record.matches_session(&session.repl_id, &session.session_id) => {
            record.shard_lsns.clone()
        }
        _ => overrides.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handshake::SessionDescriptor;

    fn session() -> SessionDescriptor {
        SessionDescriptor {
            repl_id: b"abc".to_vec(),
            session_id: "SYNC1".to_string(),
            shard_count: 2,
            version: 4,
        }
    }

    #[test]
    fn a_matching_checkpoint_wins_over_overrides() {
        let mut shard_lsns = BTreeMap::new();
        shard_lsns.insert(0, 1000);
        let checkpoint = Some(CheckpointRecord {
            repl_id: b"abc".to_vec(),
            session_id: "SYNC1".to_string(),
            shard_lsns,
            saved_at_unix: 1,
        });

        let resolved = resolve_resume_lsns(&checkpoint, &session(), &BTreeMap::new());
        assert_eq!(resolved[&0], 1000);
    }

    #[test]
    fn a_mismatched_checkpoint_is_discarded_in_favor_of_overrides() {
        let mut shard_lsns = BTreeMap::new();
        shard_lsns.insert(0, 1000);
        let checkpoint = Some(CheckpointRecord {
            repl_id: b"different".to_vec(),
            session_id: "SYNC1".to_string(),
            shard_lsns,
            saved_at_unix: 1,
        });
        let mut overrides = BTreeMap::new();
        overrides.insert(0, 5);

        let resolved = resolve_resume_lsns(&checkpoint, &session(), &overrides);
        assert_eq!(resolved[&0], 5);
    }

    #[test]
    fn no_checkpoint_and_no_overrides_means_a_full_sync_for_every_shard() {
        let resolved = resolve_resume_lsns(&None, &session(), &BTreeMap::new());
        assert!(resolved.is_empty());
    }
}
