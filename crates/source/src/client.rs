//! crates/source/src/client.rs
//!
//! One connection to the source, used for both the control connection (the
//! handshake and stable-sync transition commands) and each shard's flow
//! connection. Auth happens once, immediately after connecting, before any
//! other command is issued.

use std::time::Duration;

use wire::{Connection, Reply};

use crate::error::{SourceError, SourceResult};

/// The standard command timeout; the stable-sync transition command uses a
/// much longer deadline supplied directly by its caller (§5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connection to the source, already authenticated if a password was
/// configured.
#[derive(Debug)]
pub struct SourceClient {
    conn: Connection,
}

impl SourceClient {
    /// Connects to `addr`, authenticating with `password` if given.
    pub async fn connect(addr: &str, password: Option<&str>) -> SourceResult<Self> {
        let mut conn = Connection::connect(addr).await?;
        if let Some(password) = password {
            let reply = conn
                .call_with_deadline("AUTH", &[password.as_bytes()], DEFAULT_TIMEOUT)
                .await?;
            if !reply.is_ok() {
                return Err(SourceError::AuthRejected(describe(&reply)));
            }
        }
        Ok(Self { conn })
    }

    /// Sends a `PING` and expects a literal `PONG` status reply.
    pub async fn heartbeat(&mut self) -> SourceResult<()> {
        let reply = self
            .conn
            .call_with_deadline("PING", &[], DEFAULT_TIMEOUT)
            .await?;
        match &reply {
            Reply::Status(s) if s == "PONG" => Ok(()),
            _ => Err(SourceError::HeartbeatFailed(describe(&reply))),
        }
    }

    /// Sends a command with the standard deadline and returns its reply.
    pub async fn call(&mut self, command: &str, args: &[&[u8]]) -> SourceResult<Reply> {
        Ok(self.conn.call_with_deadline(command, args, DEFAULT_TIMEOUT).await?)
    }

    /// Sends a command with a caller-supplied deadline (the stable-sync
    /// transition command uses a much longer one than ordinary commands).
    pub async fn call_with_deadline(
        &mut self,
        command: &str,
        args: &[&[u8]],
        deadline: Duration,
    ) -> SourceResult<Reply> {
        Ok(self.conn.call_with_deadline(command, args, deadline).await?)
    }

    /// Consumes the client, returning the underlying connection so the
    /// decoder can take over the raw byte stream after the handshake and
    /// registration exchange complete.
    #[must_use]
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    /// Consumes the client, handing off its connection as a blocking-mode
    /// synchronous reader for the RDB decoder, alongside a handle the
    /// caller can use to close the socket out from under a blocked read.
    /// See [`Connection::into_sync_reader`].
    pub fn into_sync_reader(self) -> SourceResult<(impl std::io::Read + Send + 'static, wire::ShutdownHandle)> {
        Ok(self.conn.into_sync_reader()?)
    }
}

fn describe(reply: &Reply) -> String {
    match reply {
        Reply::Status(s) => s.clone(),
        Reply::Error(e) => e.clone(),
        Reply::Bulk(b) => String::from_utf8_lossy(b).into_owned(),
        Reply::Integer(n) => n.to_string(),
        Reply::Nil => "nil".to_string(),
        Reply::Array(_) => "array".to_string(),
    }
}
