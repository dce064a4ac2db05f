//! Negotiates a replication session with a source: the fixed
//! control-connection exchange (§4.3), then one flow connection per shard.
//!
//! [`HandshakeController`] owns the control connection throughout the
//! session's lifetime — it also issues the later `SYNC`/`STARTSTABLE`
//! trigger commands once the engine decides it is time to send them.

mod controller;
mod error;
mod session;
mod state;

pub use controller::{HandshakeController, STABLE_SYNC_DEADLINE};
pub use error::{HandshakeError, HandshakeResult};
pub use session::{EofToken, FlowDescriptor, SessionDescriptor, SyncKind};
pub use state::HandshakeState;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// A fake source that performs the 6-step control exchange, answering
    /// whatever the real Dragonfly source would for a healthy single-shard
    /// session, then accepts one flow connection and registers it full.
    async fn spawn_fake_source() -> (String, String) {
        let control_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let control_addr = control_listener.local_addr().unwrap().to_string();
        let flow_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let flow_addr = flow_listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut sock, _) = control_listener.accept().await.unwrap();
            // PING -> PONG
            read_command(&mut sock).await;
            sock.write_all(b"+PONG\r\n").await.unwrap();
            // REPLCONF listening-port <port>
            read_command(&mut sock).await;
            sock.write_all(b"+OK\r\n").await.unwrap();
            // REPLCONF capa eof capa psync2
            read_command(&mut sock).await;
            sock.write_all(b"+OK\r\n").await.unwrap();
            // REPLCONF capa dfly -> session descriptor
            read_command(&mut sock).await;
            sock.write_all(
                b"*4\r\n$8\r\nrepl-123\r\n$5\r\nSYNC1\r\n$1\r\n1\r\n$1\r\n1\r\n",
            )
            .await
            .unwrap();
            // REPLCONF client-id
            read_command(&mut sock).await;
            sock.write_all(b"+OK\r\n").await.unwrap();
            // REPLCONF client-version
            read_command(&mut sock).await;
            sock.write_all(b"+OK\r\n").await.unwrap();

            // DFLY SYNC SYNC1
            read_command(&mut sock).await;
            sock.write_all(b"+OK\r\n").await.unwrap();
        });

        tokio::spawn(async move {
            let (mut sock, _) = flow_listener.accept().await.unwrap();
            // PING -> PONG
            read_command(&mut sock).await;
            sock.write_all(b"+PONG\r\n").await.unwrap();
            // DFLY FLOW repl-123 SYNC1 0
            read_command(&mut sock).await;
            let token = "a".repeat(40);
            sock.write_all(format!("*2\r\n$4\r\nFULL\r\n${}\r\n{token}\r\n", token.len()).as_bytes())
                .await
                .unwrap();
        });

        (control_addr, flow_addr)
    }

    async fn read_command(sock: &mut tokio::net::TcpStream) {
        let mut buf = vec![0u8; 4096];
        let _ = sock.read(&mut buf).await.unwrap();
    }

    #[tokio::test]
    async fn negotiates_a_session_and_registers_one_shard() {
        let (control_addr, flow_addr) = spawn_fake_source().await;

        let (mut controller, session) =
            HandshakeController::handshake(&control_addr, None, 6400, None, "replisync", "0.1.0")
                .await
                .unwrap();

        assert_eq!(session.repl_id, b"repl-123");
        assert_eq!(session.session_id, "SYNC1");
        assert_eq!(session.shard_count, 1);

        let flow = controller
            .register_flow(&flow_addr, None, &session, 0, None)
            .await
            .unwrap();
        assert_eq!(flow.sync_kind, SyncKind::Full);
        assert_eq!(flow.eof_token, [b'a'; 40]);

        controller.trigger_sync(&session).await.unwrap();
    }
}
