//! The minimal interfaces the core consumes from CLI/config/state/log
//! collaborators (§6), and nothing else — this crate has no business
//! logic of its own.

mod config;
mod sinks;

pub use config::{DestinationConfig, EngineConfig};
pub use sinks::{LogLevel, LogSink, NullSink, StateSink};
