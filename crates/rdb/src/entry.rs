//! crates/rdb/src/entry.rs
//!
//! The decoder's output type: one fully-materialized key/value pair per RDB
//! data-type record, with no partial containers ever crossing the boundary
//! into the flow writer.

/// One message reconstructed from a stream value.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    /// Millisecond component of the message ID.
    pub id_ms: u64,
    /// Sequence component of the message ID.
    pub id_seq: u64,
    /// Field/value pairs carried by the message.
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

/// A fully-decoded value, independent of which wire encoding produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum RdbValue {
    /// A plain string (or a compact integer, already stringified).
    String(Vec<u8>),
    /// An ordered list of elements.
    List(Vec<Vec<u8>>),
    /// An unordered set of members.
    Set(Vec<Vec<u8>>),
    /// A hash of field/value pairs, in encounter order.
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
    /// A sorted set of (member, score) pairs, in encounter order.
    SortedSet(Vec<(Vec<u8>, f64)>),
    /// A stream, reduced to its reconstructed messages.
    Stream(Vec<StreamMessage>),
}

/// One key's worth of decoded snapshot data.
#[derive(Debug, Clone, PartialEq)]
pub struct RdbEntry {
    /// The key.
    pub key: Vec<u8>,
    /// The decoded value.
    pub value: RdbValue,
    /// Absolute expiration, in milliseconds since the epoch; 0 means none.
    pub expire_at_ms: u64,
    /// The database index this entry belongs to.
    pub db_index: u32,
}

impl RdbEntry {
    /// Returns `true` if `expire_at_ms` is set and is in the past relative to `now_ms`.
    #[must_use]
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expire_at_ms != 0 && self.expire_at_ms <= now_ms
    }
}
