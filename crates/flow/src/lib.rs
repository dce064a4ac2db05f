//! Per-shard batching, destination-node grouping, conflict resolution, and
//! pipelined writes, per §4.8.
//!
//! One [`FlowWriter`] is spawned per shard. Its [`FlowWriter::enqueue`] is
//! the sole entry point; everything else — batching, grouping by node,
//! conflict checks, command translation, pipeline chunking, and rate
//! limiting — happens in its background task.

mod conflict;
mod config;
mod error;
mod rate_limiter;
mod stats;
mod translate;
mod writer;

pub use config::{ConflictPolicy, FlowConfig, MAX_PIPELINE_CHUNK};
pub use error::{FlowError, FlowResult};
pub use rate_limiter::RateLimiter;
pub use stats::{FlowStats, FlowStatsSnapshot};
pub use translate::{translate, Command};
pub use writer::FlowWriter;
