//! crates/contracts/src/sinks.rs
//!
//! Dyn-safe traits for the two things the engine reports outward: periodic
//! metrics batches, and structured lifecycle log lines. Both are owned by
//! external collaborators (the embedded dashboard, the log shipping
//! utility) that this specification deliberately leaves out of scope —
//! the engine only ever sees these narrow interfaces.

use async_trait::async_trait;
use metrics::MetricsBatch;

/// Receives the engine's periodic metrics batch.
#[async_trait]
pub trait StateSink: Send + Sync {
    /// Reports one batch. Errors are logged by the caller and never stop
    /// the engine's steady-state loop — a metrics sink outage must not
    /// interrupt replication.
    async fn report_metrics(&self, batch: MetricsBatch);
}

/// Receives structured lifecycle events: stage transitions, fatal errors,
/// and other information the host process surfaces to operators.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Reports one line at the given severity.
    async fn log(&self, level: LogLevel, message: &str);
}

/// Severity of a [`LogSink::log`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Diagnostic detail, off by default in most deployments.
    Debug,
    /// Routine lifecycle information.
    Info,
    /// A recoverable problem worth an operator's attention.
    Warn,
    /// A fatal problem that is ending the run.
    Error,
}

/// A [`StateSink`]/[`LogSink`] pair that discards everything, for tests and
/// for runs where no external collaborator is configured.
pub struct NullSink;

#[async_trait]
impl StateSink for NullSink {
    async fn report_metrics(&self, _batch: MetricsBatch) {}
}

#[async_trait]
impl LogSink for NullSink {
    async fn log(&self, _level: LogLevel, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_sink_accepts_every_call_without_panicking() {
        let sink = NullSink;
        sink.report_metrics(MetricsBatch::new()).await;
        sink.log(LogLevel::Warn, "test").await;
    }
}
