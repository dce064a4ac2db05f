//! crates/checkpoint/src/record.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Persisted replication progress, enabling resumable partial sync across
/// restarts. A record is only usable to resume a session if its `repl_id`
/// and `session_id` match the values the source returns on the next
/// handshake; otherwise it is discarded and the engine falls back to a
/// full sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Hex-encoded replication identifier from the session that produced
    /// this checkpoint.
    #[serde(with = "hex_bytes")]
    pub repl_id: Vec<u8>,
    /// Session token from the session that produced this checkpoint.
    pub session_id: String,
    /// Each shard's last durably-applied journal sequence number.
    pub shard_lsns: BTreeMap<u32, u64>,
    /// Unix timestamp, in seconds, of the save that produced this record.
    pub saved_at_unix: u64,
}

impl CheckpointRecord {
    /// Returns `true` if this record was produced by the same replication
    /// session the source is currently offering.
    #[must_use]
    pub fn matches_session(&self, repl_id: &[u8], session_id: &str) -> bool {
        self.repl_id == repl_id && self.session_id == session_id
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            out.push_str(&format!("{byte:02x}"));
        }
        serializer.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.len() % 2 != 0 {
            return Err(serde::de::Error::custom("odd-length hex string"));
        }
        (0..text.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&text[i..i + 2], 16)
                    .map_err(|_| serde::de::Error::custom("invalid hex digit"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut shard_lsns = BTreeMap::new();
        shard_lsns.insert(0, 100);
        shard_lsns.insert(1, 250);
        let record = CheckpointRecord {
            repl_id: vec![0xDE, 0xAD, 0xBE, 0xEF],
            session_id: "SYNC7".to_string(),
            shard_lsns,
            saved_at_unix: 1_700_000_000,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"deadbeef\""));
        let decoded: CheckpointRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn matches_session_compares_both_identifiers() {
        let record = CheckpointRecord {
            repl_id: b"abc".to_vec(),
            session_id: "S1".to_string(),
            shard_lsns: BTreeMap::new(),
            saved_at_unix: 0,
        };
        assert!(record.matches_session(b"abc", "S1"));
        assert!(!record.matches_session(b"abc", "S2"));
        assert!(!record.matches_session(b"xyz", "S1"));
    }
}
