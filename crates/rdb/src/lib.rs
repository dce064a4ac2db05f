//! Streaming decoder for Dragonfly RDB snapshots.
//!
//! A [`Decoder`] wraps one shard's connection and produces a sequence of
//! [`RdbEvent`]s: fully-materialized [`RdbEntry`] records, inline journal
//! frames dispatched mid-snapshot, and the `SnapshotComplete`/`Eof`
//! markers that drive the replication engine's full-sync barrier. The
//! container encodings (ziplist, listpack, intset) and stream
//! reconstruction are pure functions with no I/O, independently tested
//! against the property list covering their value ranges.

mod blob;
mod decoder;
mod entry;
mod error;
mod intset;
mod listpack;
mod stream;
mod ziplist;

pub use decoder::{Decoder, RdbEvent};
pub use entry::{RdbEntry, RdbValue, StreamMessage};
pub use error::{RdbError, RdbResult};
pub use intset::decode as decode_intset;
pub use listpack::{decode as decode_listpack, LpEntry};
pub use ziplist::{decode as decode_ziplist, ZlEntry};
