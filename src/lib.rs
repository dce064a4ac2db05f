//! Dragonfly-to-Redis online migration.
//!
//! This crate is the library surface a host process embeds: build an
//! [`EngineConfig`], supply a [`StateSink`] and [`LogSink`], and call
//! [`run`]. Argument parsing, YAML configuration loading, and the embedded
//! dashboard that would normally drive these are out of scope here and
//! live in whatever process links this crate in.

pub use contracts::{DestinationConfig, EngineConfig, LogLevel, LogSink, NullSink, StateSink};
pub use engine::{Engine, EngineError, EngineResult};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Connects to the destination, negotiates a session with the source, and
/// runs replication until `cancel` fires or a fatal error occurs.
///
/// This is the library's single entry point; it exists so a host process
/// doesn't need to know about [`Engine::new`] vs. [`Engine::run`] as two
/// separate steps.
pub async fn run(
    config: EngineConfig,
    state_sink: Arc<dyn StateSink>,
    log_sink: Arc<dyn LogSink>,
    cancel: CancellationToken,
) -> EngineResult<()> {
    let engine = Engine::new(config).await?;
    engine.run(state_sink, log_sink, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_surface_is_reachable_without_naming_internal_crates() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineConfig>();
        assert_send_sync::<Arc<dyn StateSink>>();
        assert_send_sync::<Arc<dyn LogSink>>();
    }
}
