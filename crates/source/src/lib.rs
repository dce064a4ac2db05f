//! Single-connection client to the Dragonfly source.
//!
//! Used both for the control connection (the handshake in `handshake` and
//! the stable-sync transition command) and for each shard's flow
//! connection, up until registration completes and the raw stream is
//! handed off to the RDB decoder.

mod client;
mod error;

pub use client::{SourceClient, DEFAULT_TIMEOUT};
pub use error::{SourceError, SourceResult};

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn heartbeat_succeeds_on_pong() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..n]).contains("PING"));
            sock.write_all(b"+PONG\r\n").await.unwrap();
        });

        let mut client = SourceClient::connect(&addr.to_string(), None).await.unwrap();
        client.heartbeat().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn auth_failure_surfaces_before_any_other_command() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..n]).contains("AUTH"));
            sock.write_all(b"-ERR invalid password\r\n").await.unwrap();
        });

        let err = SourceClient::connect(&addr.to_string(), Some("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::AuthRejected(_)));
        server.await.unwrap();
    }
}
