//! RESP request/reply framing for both the source connection and the
//! destination connections.
//!
//! The source speaks a Redis-compatible text protocol: arrays of
//! length-prefixed bulk strings as requests, and one of five reply shapes
//! (status, error, integer, bulk string, array) as responses. This crate
//! frames that protocol over an async TCP connection with no retry policy
//! of its own — deadlines and retries are the caller's problem (see
//! `source`, `cluster`, and `handshake`).

mod connection;
mod error;
mod reply;

pub use connection::{Connection, ShutdownHandle};
pub use error::{WireError, WireResult};
pub use reply::{encode_command, read_reply, Reply};
