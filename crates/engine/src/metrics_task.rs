//! crates/engine/src/metrics_task.rs
//!
//! Periodically flattens the live counters into a [`MetricsBatch`] and
//! hands it to the configured [`StateSink`], per §6's outbound metrics
//! contract.

use std::sync::Arc;
use std::time::Duration;

use contracts::StateSink;
use metrics::MetricsRecorder;
use tokio_util::sync::CancellationToken;

/// Runs the periodic metrics-flush loop until `cancel` fires.
pub async fn run_metrics_task(
    recorder: Arc<MetricsRecorder>,
    sink: Arc<dyn StateSink>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                sink.report_metrics(recorder.snapshot()).await;
                break;
            }
            _ = ticker.tick() => {
                sink.report_metrics(recorder.snapshot()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::NullSink;

    #[tokio::test]
    async fn stops_promptly_once_cancelled() {
        let recorder = Arc::new(MetricsRecorder::new());
        let sink: Arc<dyn StateSink> = Arc::new(NullSink);
        let cancel = CancellationToken::new();

        let cancel_clone = cancel.clone();
        let handle = tokio::spawn(run_metrics_task(
            recorder,
            sink,
            Duration::from_secs(60),
            cancel_clone,
        ));

        cancel.cancel();
        tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("metrics task did not stop after cancellation")
            .unwrap();
    }
}
