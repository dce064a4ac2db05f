//! crates/flow/src/conflict.rs

use cluster::ClusterClient;

use crate::config::ConflictPolicy;
use crate::error::FlowResult;

/// What the writer should do with an entry once its conflict policy has
/// been consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Proceed with the write.
    Write,
    /// Drop the entry without writing; counts as skipped.
    Skip,
}

/// Applies `policy` to `key`, issuing an `EXISTS` check against `cluster`
/// when the policy isn't `overwrite`.
pub async fn evaluate(
    cluster: &ClusterClient,
    policy: ConflictPolicy,
    key: &[u8],
) -> FlowResult<Disposition> {
    if policy == ConflictPolicy::Overwrite {
        return Ok(Disposition::Write);
    }

    let reply = cluster.do_cmd("EXISTS", &[key]).await?;
    let exists = matches!(reply, wire::Reply::Integer(n) if n > 0);

    if !exists {
        return Ok(Disposition::Write);
    }

    match policy {
        ConflictPolicy::Overwrite => unreachable!("handled above"),
        ConflictPolicy::Skip => Ok(Disposition::Skip),
        ConflictPolicy::Panic => Err(crate::error::FlowError::Conflict(key.to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn fake_destination(exists_reply: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // CLUSTER SLOTS -> error, forcing standalone topology.
            let mut buf = vec![0u8; 4096];
            let _ = sock.read(&mut buf).await.unwrap();
            sock.write_all(b"-ERR This instance has cluster support disabled\r\n")
                .await
                .unwrap();
            // EXISTS key
            let _ = sock.read(&mut buf).await.unwrap();
            sock.write_all(exists_reply).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn overwrite_never_issues_exists() {
        let addr = fake_destination(b":1\r\n").await;
        let cluster = ClusterClient::connect(&addr).await.unwrap();
        // No EXISTS is ever sent for Overwrite, so the fake server's first
        // reply (meant for CLUSTER SLOTS) is irrelevant here.
        let disposition = evaluate(&cluster, ConflictPolicy::Overwrite, b"k").await.unwrap();
        assert_eq!(disposition, Disposition::Write);
    }

    #[tokio::test]
    async fn skip_drops_an_existing_key() {
        let addr = fake_destination(b":1\r\n").await;
        let cluster = ClusterClient::connect(&addr).await.unwrap();
        let disposition = evaluate(&cluster, ConflictPolicy::Skip, b"k").await.unwrap();
        assert_eq!(disposition, Disposition::Skip);
    }

    #[tokio::test]
    async fn panic_fails_on_an_existing_key() {
        let addr = fake_destination(b":1\r\n").await;
        let cluster = ClusterClient::connect(&addr).await.unwrap();
        let err = evaluate(&cluster, ConflictPolicy::Panic, b"k").await.unwrap_err();
        assert!(matches!(err, crate::error::FlowError::Conflict(key) if key == b"k"));
    }

    #[tokio::test]
    async fn skip_writes_an_absent_key() {
        let addr = fake_destination(b":0\r\n").await;
        let cluster = ClusterClient::connect(&addr).await.unwrap();
        let disposition = evaluate(&cluster, ConflictPolicy::Skip, b"k").await.unwrap();
        assert_eq!(disposition, Disposition::Write);
    }
}
