//! crates/handshake/src/controller.rs
//!
//! Drives the fixed control-connection exchange (§4.3 steps 1-6), then
//! opens and registers one flow connection per shard. The control
//! connection stays open afterward for the data-transfer trigger and the
//! stable-sync transition command, both issued later by the engine once
//! every shard has registered (and, for the latter, once the full-sync
//! barrier releases).

use std::time::Duration;

use source::SourceClient;
use wire::Reply;

use crate::error::{HandshakeError, HandshakeResult};
use crate::session::{EofToken, FlowDescriptor, SessionDescriptor, SyncKind};

/// The long deadline for `STARTSTABLE`: the source may coordinate all its
/// shards before replying, which can take tens of seconds on large sources.
pub const STABLE_SYNC_DEADLINE: Duration = Duration::from_secs(120);

/// Drives the handshake and per-shard registration.
pub struct HandshakeController {
    control: SourceClient,
}

impl HandshakeController {
    /// Opens the control connection and runs the fixed exchange (§4.3
    /// steps 1-6), returning the negotiated session descriptor.
    pub async fn handshake(
        source_addr: &str,
        password: Option<&str>,
        listening_port: u16,
        announce_ip: Option<&str>,
        client_id: &str,
        client_version: &str,
    ) -> HandshakeResult<(Self, SessionDescriptor)> {
        let mut control = SourceClient::connect(source_addr, password).await?;

        // Step 1: heartbeat probe.
        control.heartbeat().await?;

        // Step 2: announce listening port.
        control
            .call("REPLCONF", &[b"listening-port", listening_port.to_string().as_bytes()])
            .await?;

        // Step 3: optionally announce an IP address.
        if let Some(ip) = announce_ip {
            control.call("REPLCONF", &[b"ip-address", ip.as_bytes()]).await?;
        }

        // Step 4: declare capabilities.
        control
            .call("REPLCONF", &[b"capa", b"eof", b"capa", b"psync2"])
            .await?;

        // Step 5: declare the source-specific capability and parse the session reply.
        let reply = control.call("REPLCONF", &[b"capa", b"dfly"]).await?;
        let session = parse_session_reply(&reply)?;

        // Step 6: announce client identifier and version; tolerate non-OK.
        let _ = control
            .call("REPLCONF", &[b"client-id", client_id.as_bytes()])
            .await;
        let _ = control
            .call("REPLCONF", &[b"client-version", client_version.as_bytes()])
            .await;

        Ok((Self { control }, session))
    }

    /// Opens and registers one shard's flow connection.
    ///
    /// `resume_lsn`, if the caller has a matching checkpoint for this
    /// shard, requests a partial sync starting just past that sequence
    /// number.
    pub async fn register_flow(
        &self,
        source_addr: &str,
        password: Option<&str>,
        session: &SessionDescriptor,
        shard_index: u32,
        resume_lsn: Option<u64>,
    ) -> HandshakeResult<FlowDescriptor> {
        let mut client = SourceClient::connect(source_addr, password).await?;
        client.heartbeat().await?;

        let shard_str = shard_index.to_string();
        let reply = if let Some(lsn) = resume_lsn {
            let lsn_str = lsn.to_string();
            client
                .call(
                    "DFLY",
                    &[
                        b"FLOW",
                        &session.repl_id,
                        session.session_id.as_bytes(),
                        shard_str.as_bytes(),
                        lsn_str.as_bytes(),
                    ],
                )
                .await?
        } else {
            client
                .call(
                    "DFLY",
                    &[
                        b"FLOW",
                        &session.repl_id,
                        session.session_id.as_bytes(),
                        shard_str.as_bytes(),
                    ],
                )
                .await?
        };

        let (sync_kind, eof_token) = parse_registration_reply(&reply)?;

        Ok(FlowDescriptor {
            shard_index,
            sync_kind,
            eof_token,
            client,
        })
    }

    /// Sends the data-transfer trigger once every shard has registered.
    pub async fn trigger_sync(&mut self, session: &SessionDescriptor) -> HandshakeResult<()> {
        let reply = self
            .control
            .call("DFLY", &[b"SYNC", session.session_id.as_bytes()])
            .await?;
        if !reply.is_ok() {
            return Err(HandshakeError::MalformedReply(format!(
                "expected OK from SYNC, got {reply:?}"
            )));
        }
        Ok(())
    }

    /// Sends the stable-sync transition once the global full-sync barrier
    /// releases. Uses [`STABLE_SYNC_DEADLINE`] rather than the standard
    /// per-command timeout.
    pub async fn start_stable_sync(&mut self, session: &SessionDescriptor) -> HandshakeResult<()> {
        let reply = self
            .control
            .call_with_deadline(
                "DFLY",
                &[b"STARTSTABLE", session.session_id.as_bytes()],
                STABLE_SYNC_DEADLINE,
            )
            .await?;
        if !reply.is_ok() {
            return Err(HandshakeError::MalformedReply(format!(
                "expected OK from STARTSTABLE, got {reply:?}"
            )));
        }
        Ok(())
    }
}

fn parse_session_reply(reply: &Reply) -> HandshakeResult<SessionDescriptor> {
    if reply.is_ok() {
        return Err(HandshakeError::IncompatiblePeer);
    }
    let fields = reply
        .as_array()
        .ok_or_else(|| HandshakeError::MalformedReply("expected a 4-element array".into()))?;
    if fields.len() != 4 {
        return Err(HandshakeError::MalformedReply(format!(
            "expected 4 fields, got {}",
            fields.len()
        )));
    }
    let repl_id = bulk(&fields[0])?.to_vec();
    let session_id = String::from_utf8_lossy(bulk(&fields[1])?).into_owned();
    let shard_count = parse_u32(&fields[2])?;
    let version = parse_u32(&fields[3])?;

    Ok(SessionDescriptor {
        repl_id,
        session_id,
        shard_count,
        version,
    })
}

fn parse_registration_reply(reply: &Reply) -> HandshakeResult<(SyncKind, EofToken)> {
    let fields = reply
        .as_array()
        .ok_or_else(|| HandshakeError::MalformedReply("expected a 2-element array".into()))?;
    if fields.len() != 2 {
        return Err(HandshakeError::MalformedReply(format!(
            "expected 2 fields, got {}",
            fields.len()
        )));
    }
    let kind_bytes = bulk(&fields[0])?;
    let sync_kind = match kind_bytes {
        b"FULL" => SyncKind::Full,
        b"PARTIAL" => SyncKind::Partial,
        other => return Err(HandshakeError::UnrecognizedSyncKind(other.to_vec())),
    };

    let token_bytes = bulk(&fields[1])?;
    if token_bytes.len() != 40 {
        return Err(HandshakeError::BadEofTokenLength(token_bytes.len()));
    }
    let mut eof_token: EofToken = [0u8; 40];
    eof_token.copy_from_slice(token_bytes);

    Ok((sync_kind, eof_token))
}

fn bulk(reply: &Reply) -> HandshakeResult<&[u8]> {
    reply
        .as_bulk()
        .ok_or_else(|| HandshakeError::MalformedReply("expected a bulk string field".into()))
}

fn parse_u32(reply: &Reply) -> HandshakeResult<u32> {
    match reply {
        Reply::Integer(n) => Ok(*n as u32),
        Reply::Bulk(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| HandshakeError::MalformedReply("expected an integer field".into())),
        _ => Err(HandshakeError::MalformedReply("expected an integer field".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_session_reply() {
        let reply = Reply::Array(vec![
            Reply::Bulk(b"repl-abc".to_vec()),
            Reply::Bulk(b"SYNC1".to_vec()),
            Reply::Integer(4),
            Reply::Integer(1),
        ]);
        let session = parse_session_reply(&reply).unwrap();
        assert_eq!(session.repl_id, b"repl-abc");
        assert_eq!(session.session_id, "SYNC1");
        assert_eq!(session.shard_count, 4);
        assert_eq!(session.version, 1);
    }

    #[test]
    fn plain_ok_reply_is_an_incompatible_peer() {
        let reply = Reply::Status("OK".into());
        assert!(matches!(
            parse_session_reply(&reply),
            Err(HandshakeError::IncompatiblePeer)
        ));
    }

    #[test]
    fn parses_a_full_registration_reply() {
        let token = vec![b'a'; 40];
        let reply = Reply::Array(vec![Reply::Bulk(b"FULL".to_vec()), Reply::Bulk(token.clone())]);
        let (kind, eof) = parse_registration_reply(&reply).unwrap();
        assert_eq!(kind, SyncKind::Full);
        assert_eq!(eof.to_vec(), token);
    }

    #[test]
    fn rejects_a_short_eof_token() {
        let reply = Reply::Array(vec![Reply::Bulk(b"FULL".to_vec()), Reply::Bulk(b"short".to_vec())]);
        assert!(matches!(
            parse_registration_reply(&reply),
            Err(HandshakeError::BadEofTokenLength(5))
        ));
    }

    #[test]
    fn rejects_an_unrecognized_sync_kind() {
        let reply = Reply::Array(vec![Reply::Bulk(b"WEIRD".to_vec()), Reply::Bulk(vec![0u8; 40])]);
        assert!(matches!(
            parse_registration_reply(&reply),
            Err(HandshakeError::UnrecognizedSyncKind(_))
        ));
    }
}
