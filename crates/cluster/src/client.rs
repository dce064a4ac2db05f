//! crates/cluster/src/client.rs
//!
//! One connection per destination node, serialized access per connection,
//! and a slot→node map that's replaced wholesale (never mutated in place)
//! on topology refresh so in-flight writers always see a consistent map.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use wire::{Connection, Reply};

use crate::error::{ClusterError, ClusterResult};
use crate::slot;
use crate::topology::Topology;

/// Destination client routing commands by slot, with MOVED redirection
/// handling and per-node pipelining.
pub struct ClusterClient {
    topology: RwLock<Arc<Topology>>,
    connections: DashMap<String, Arc<AsyncMutex<Connection>>>,
    is_cluster: AtomicBool,
}

impl ClusterClient {
    /// Connects to `seed_addr` and attempts topology discovery. If the
    /// destination is a standalone instance (no cluster support), falls
    /// back to a single-node topology owning every slot.
    pub async fn connect(seed_addr: &str) -> ClusterResult<Self> {
        let client = Self {
            topology: RwLock::new(Arc::new(Topology::single(seed_addr))),
            connections: DashMap::new(),
            is_cluster: AtomicBool::new(false),
        };

        match client.discover_topology(seed_addr).await {
            Ok(topology) => {
                client.replace_topology(topology);
                client.is_cluster.store(true, Ordering::Relaxed);
            }
            Err(_) => {
                // CLUSTER SLOTS failing (e.g. "cluster support disabled") means
                // this is a standalone destination; the single-node topology
                // already installed above is correct.
            }
        }
        Ok(client)
    }

    /// Returns `true` if the destination answered `CLUSTER SLOTS` at
    /// connect time (the flow writer's backpressure budget and the
    /// replay path's per-shard `SELECT` handling both depend on this).
    #[must_use]
    pub fn is_cluster(&self) -> bool {
        self.is_cluster.load(Ordering::Relaxed)
    }

    async fn discover_topology(&self, seed_addr: &str) -> ClusterResult<Topology> {
        let conn = self.connection_for(seed_addr).await?;
        let mut conn = conn.lock().await;
        let reply = conn.call("CLUSTER", &[b"SLOTS"]).await?;
        if let Some(err) = reply.as_error() {
            return Err(ClusterError::Topology(err.to_string()));
        }
        Topology::from_cluster_slots_reply(&reply)
    }

    fn replace_topology(&self, topology: Topology) {
        *self.topology.write().expect("topology lock poisoned") = Arc::new(topology);
    }

    fn current_topology(&self) -> Arc<Topology> {
        self.topology.read().expect("topology lock poisoned").clone()
    }

    /// Computes the slot for `key`.
    #[must_use]
    pub fn slot(&self, key: &[u8]) -> u16 {
        slot::slot(key)
    }

    /// Every distinct master address in the current topology.
    #[must_use]
    pub fn masters(&self) -> Vec<String> {
        self.current_topology().masters().to_vec()
    }

    async fn connection_for(&self, addr: &str) -> ClusterResult<Arc<AsyncMutex<Connection>>> {
        if let Some(existing) = self.connections.get(addr) {
            return Ok(existing.clone());
        }
        let conn = Connection::connect(addr).await?;
        let arc = Arc::new(AsyncMutex::new(conn));
        self.connections.insert(addr.to_string(), arc.clone());
        Ok(arc)
    }

    /// Resolves the destination node address that owns `key`'s slot, for
    /// callers (the flow writer) that need to group entries by node ahead
    /// of issuing commands.
    pub fn node_for_key(&self, key: &[u8]) -> ClusterResult<String> {
        let topology = self.current_topology();
        let slot = slot::slot(key);
        topology
            .node_for_slot(slot)
            .map(str::to_string)
            .ok_or_else(|| ClusterError::Topology(format!("no node owns slot {slot}")))
    }

    /// Routes `command` by the slot of `args[0]` (the command's first key),
    /// retrying once against the indicated node on a `MOVED` redirection.
    pub async fn do_cmd(&self, command: &str, args: &[&[u8]]) -> ClusterResult<Reply> {
        let key = args.first().copied().unwrap_or(command.as_bytes());
        let addr = self.node_for_key(key)?;
        self.do_cmd_at(&addr, command, args, false).await
    }

    fn do_cmd_at<'a>(
        &'a self,
        addr: &'a str,
        command: &'a str,
        args: &'a [&'a [u8]],
        already_retried: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ClusterResult<Reply>> + Send + 'a>> {
        Box::pin(async move {
            let conn = self.connection_for(addr).await?;
            let reply = {
                let mut conn = conn.lock().await;
                conn.call(command, args).await?
            };

            if let Some(redirect) = reply.as_error().and_then(parse_moved) {
                if already_retried {
                    return Err(ClusterError::DoubleMoved(redirect));
                }
                if let Ok(topology) = self.discover_topology(&redirect).await {
                    self.replace_topology(topology);
                }
                return self.do_cmd_at(&redirect, command, args, true).await;
            }

            Ok(reply)
        })
    }

    /// Sends every command in `commands` to `addr` in a single pipeline and
    /// returns the replies in submission order. Does not retry on `MOVED`;
    /// the caller (the flow writer, which already grouped entries by the
    /// node it believed owned them) decides how to handle a moved batch.
    pub async fn pipeline_for_node(
        &self,
        addr: &str,
        commands: &[(&str, Vec<&[u8]>)],
    ) -> ClusterResult<Vec<Reply>> {
        let conn = self.connection_for(addr).await?;
        let mut conn = conn.lock().await;
        Ok(conn.pipeline(commands).await?)
    }

    /// Runs `f` against every master node's connection.
    pub async fn for_each_master<F, Fut>(&self, mut f: F) -> ClusterResult<()>
    where
        F: FnMut(String, Arc<AsyncMutex<Connection>>) -> Fut,
        Fut: std::future::Future<Output = ClusterResult<()>>,
    {
        for addr in self.masters() {
            let conn = self.connection_for(&addr).await?;
            f(addr, conn).await?;
        }
        Ok(())
    }
}

fn parse_moved(error: &str) -> Option<String> {
    let mut parts = error.split_whitespace();
    if parts.next()? != "MOVED" {
        return None;
    }
    let _slot = parts.next()?;
    let addr = parts.next()?;
    Some(addr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_moved_error() {
        assert_eq!(
            parse_moved("MOVED 1234 10.0.0.2:6379"),
            Some("10.0.0.2:6379".to_string())
        );
    }

    #[test]
    fn ignores_unrelated_errors() {
        assert_eq!(parse_moved("ERR wrong number of arguments"), None);
    }
}
