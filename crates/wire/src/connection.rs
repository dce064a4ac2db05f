//! crates/wire/src/connection.rs
//!
//! A thin async RESP connection: `send`, `read_reply`, and `pipeline`. No
//! hidden retries live here — callers supply their own deadlines via
//! [`Connection::send_with_deadline`] and friends, and decide what to do
//! with a [`WireError::Timeout`].

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{WireError, WireResult};
use crate::reply::{encode_command, read_reply, Reply};

/// An async RESP connection over a TCP stream.
#[derive(Debug)]
pub struct Connection {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: BufWriter<tokio::net::tcp::OwnedWriteHalf>,
}

impl Connection {
    /// Wraps an already-connected TCP stream.
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        }
    }

    /// Connects to `addr` and enables TCP keep-alive, per the engine's
    /// dead-peer detection policy (probe interval ~30s).
    pub async fn connect(addr: &str) -> WireResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        configure_keepalive(&stream);
        Ok(Self::from_stream(stream))
    }

    /// Sends one command with no deadline.
    pub async fn send(&mut self, command: &str, args: &[&[u8]]) -> WireResult<()> {
        let encoded = encode_command(command, args);
        self.writer.write_all(&encoded).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Sends one command, enforcing `deadline`.
    pub async fn send_with_deadline(
        &mut self,
        command: &str,
        args: &[&[u8]],
        deadline: Duration,
    ) -> WireResult<()> {
        timeout(deadline, self.send(command, args))
            .await
            .map_err(|_| WireError::Timeout)?
    }

    /// Reads one reply with no deadline.
    pub async fn read_reply(&mut self) -> WireResult<Reply> {
        read_reply(&mut self.reader).await
    }

    /// Reads one reply, enforcing `deadline`.
    pub async fn read_reply_with_deadline(&mut self, deadline: Duration) -> WireResult<Reply> {
        timeout(deadline, self.read_reply())
            .await
            .map_err(|_| WireError::Timeout)?
    }

    /// Sends a command and reads its reply.
    pub async fn call(&mut self, command: &str, args: &[&[u8]]) -> WireResult<Reply> {
        self.send(command, args).await?;
        self.read_reply().await
    }

    /// Sends a command and reads its reply within `deadline`.
    pub async fn call_with_deadline(
        &mut self,
        command: &str,
        args: &[&[u8]],
        deadline: Duration,
    ) -> WireResult<Reply> {
        self.send_with_deadline(command, args, deadline).await?;
        self.read_reply_with_deadline(deadline).await
    }

    /// Sends every command in `commands`, then reads exactly that many
    /// replies, in submission order.
    pub async fn pipeline(&mut self, commands: &[(&str, Vec<&[u8]>)]) -> WireResult<Vec<Reply>> {
        for (cmd, args) in commands {
            let encoded = encode_command(cmd, args);
            self.writer.write_all(&encoded).await?;
        }
        self.writer.flush().await?;

        let mut replies = Vec::with_capacity(commands.len());
        for _ in commands {
            replies.push(self.read_reply().await?);
        }
        Ok(replies)
    }

    /// Reunites this connection's halves into a blocking-mode
    /// `std::net::TcpStream` wrapped in a synchronous reader, for handing
    /// off to the RDB decoder inside a `spawn_blocking` task once a shard's
    /// registration exchange completes. Any bytes the async reader had
    /// already buffered are replayed first via a `Cursor`, so nothing the
    /// source sent ahead of this call is lost.
    ///
    /// Returns the reader alongside a [`ShutdownHandle`]: the blocking
    /// thread's read has no way to observe a cancellation token, so the
    /// engine's preferred shutdown path is to close the socket out from
    /// under it.
    pub fn into_sync_reader(self) -> WireResult<(impl std::io::Read + Send + 'static, ShutdownHandle)> {
        let leftover = self.reader.buffer().to_vec();
        let read_half = self.reader.into_inner();
        let write_half = self.writer.into_inner();
        let stream = read_half
            .reunite(write_half)
            .map_err(|_| WireError::protocol("connection halves came from different streams"))?;
        let std_stream = stream.into_std()?;
        std_stream.set_nonblocking(false)?;
        let shutdown_handle = ShutdownHandle(std_stream.try_clone()?);
        Ok((std::io::Read::chain(std::io::Cursor::new(leftover), std_stream), shutdown_handle))
    }
}

/// A clone of a sync reader's socket, kept only to shut it down from
/// another task once the engine decides to stop.
pub struct ShutdownHandle(std::net::TcpStream);

impl ShutdownHandle {
    /// Shuts down both directions of the socket, unblocking whatever
    /// blocking read the decode thread is in the middle of.
    pub fn shutdown(&self) {
        let _ = self.0.shutdown(std::net::Shutdown::Both);
    }
}

fn configure_keepalive(stream: &TcpStream) {
    use socket2::{SockRef, TcpKeepalive};
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(30))
        .with_interval(Duration::from_secs(30));
    let sock = SockRef::from(stream);
    let _ = sock.set_tcp_keepalive(&keepalive);
}
