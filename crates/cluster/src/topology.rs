//! crates/cluster/src/topology.rs
//!
//! Destination topology: either a single node owning every slot, or a
//! 16384-entry slot→node map built from the cluster slot-listing command's
//! reply.

use std::collections::BTreeSet;

use wire::Reply;

use crate::error::{ClusterError, ClusterResult};

const SLOT_COUNT: usize = 16384;

/// The destination's current topology.
#[derive(Debug, Clone)]
pub struct Topology {
    /// `slots[i]` is the address owning slot `i`, if assigned.
    slots: Vec<Option<String>>,
    /// The distinct master addresses, for `for_each_master`.
    masters: Vec<String>,
}

impl Topology {
    /// Builds a single-node topology owning every slot (a standalone destination).
    #[must_use]
    pub fn single(addr: &str) -> Self {
        Self {
            slots: vec![Some(addr.to_string()); SLOT_COUNT],
            masters: vec![addr.to_string()],
        }
    }

    /// Parses a cluster slot-listing reply: an array of
    /// `[start, end, [ip, port, id, ...], replica*]` entries.
    pub fn from_cluster_slots_reply(reply: &Reply) -> ClusterResult<Self> {
        let ranges = reply
            .as_array()
            .ok_or_else(|| ClusterError::Topology("expected an array reply".into()))?;

        let mut slots: Vec<Option<String>> = vec![None; SLOT_COUNT];
        let mut masters = BTreeSet::new();

        for range in ranges {
            let fields = range
                .as_array()
                .ok_or_else(|| ClusterError::Topology("expected a range array".into()))?;
            if fields.len() < 3 {
                return Err(ClusterError::Topology("range entry missing fields".into()));
            }
            let start = reply_to_i64(&fields[0])?;
            let end = reply_to_i64(&fields[1])?;
            let master = fields[2]
                .as_array()
                .ok_or_else(|| ClusterError::Topology("expected a master descriptor array".into()))?;
            if master.len() < 2 {
                return Err(ClusterError::Topology("master descriptor missing host/port".into()));
            }
            let host = reply_to_string(&master[0])?;
            let port = reply_to_i64(&master[1])?;
            let addr = format!("{host}:{port}");

            masters.insert(addr.clone());
            for slot in start..=end {
                if let Some(slot_ref) = slots.get_mut(slot as usize) {
                    *slot_ref = Some(addr.clone());
                }
            }
        }

        if masters.is_empty() {
            return Err(ClusterError::Topology("no masters in topology reply".into()));
        }

        Ok(Self {
            slots,
            masters: masters.into_iter().collect(),
        })
    }

    /// Returns the address owning `slot`, if assigned.
    #[must_use]
    pub fn node_for_slot(&self, slot: u16) -> Option<&str> {
        self.slots.get(slot as usize).and_then(|s| s.as_deref())
    }

    /// Returns every distinct master address.
    #[must_use]
    pub fn masters(&self) -> &[String] {
        &self.masters
    }
}

fn reply_to_i64(reply: &Reply) -> ClusterResult<i64> {
    match reply {
        Reply::Integer(n) => Ok(*n),
        Reply::Bulk(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ClusterError::Topology("expected an integer field".into())),
        _ => Err(ClusterError::Topology("expected an integer field".into())),
    }
}

fn reply_to_string(reply: &Reply) -> ClusterResult<String> {
    match reply {
        Reply::Bulk(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        Reply::Status(s) => Ok(s.clone()),
        _ => Err(ClusterError::Topology("expected a string field".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_topology_owns_every_slot() {
        let topo = Topology::single("127.0.0.1:6379");
        assert_eq!(topo.node_for_slot(0), Some("127.0.0.1:6379"));
        assert_eq!(topo.node_for_slot(16383), Some("127.0.0.1:6379"));
        assert_eq!(topo.masters(), &["127.0.0.1:6379".to_string()]);
    }

    #[test]
    fn parses_a_three_master_topology() {
        let reply = Reply::Array(vec![
            Reply::Array(vec![
                Reply::Integer(0),
                Reply::Integer(5460),
                Reply::Array(vec![Reply::Bulk(b"10.0.0.1".to_vec()), Reply::Integer(6379)]),
            ]),
            Reply::Array(vec![
                Reply::Integer(5461),
                Reply::Integer(10922),
                Reply::Array(vec![Reply::Bulk(b"10.0.0.2".to_vec()), Reply::Integer(6379)]),
            ]),
            Reply::Array(vec![
                Reply::Integer(10923),
                Reply::Integer(16383),
                Reply::Array(vec![Reply::Bulk(b"10.0.0.3".to_vec()), Reply::Integer(6379)]),
            ]),
        ]);

        let topo = Topology::from_cluster_slots_reply(&reply).unwrap();
        assert_eq!(topo.node_for_slot(0), Some("10.0.0.1:6379"));
        assert_eq!(topo.node_for_slot(5460), Some("10.0.0.1:6379"));
        assert_eq!(topo.node_for_slot(5461), Some("10.0.0.2:6379"));
        assert_eq!(topo.node_for_slot(16383), Some("10.0.0.3:6379"));
        assert_eq!(topo.masters().len(), 3);
    }

    #[test]
    fn rejects_a_non_array_reply() {
        let reply = Reply::Status("OK".into());
        assert!(Topology::from_cluster_slots_reply(&reply).is_err());
    }
}
