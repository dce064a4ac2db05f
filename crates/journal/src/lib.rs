//! Codec for the post-snapshot journal stream.
//!
//! A journal frame is a one-byte opcode plus an opcode-specific body. The
//! same frame shape is used whether it arrives over a stable-sync
//! connection or embedded inline in an RDB snapshot's `0xD2` opcode — the
//! `rdb` crate depends on this one for that reason.

mod codec;
mod error;
mod frame;

pub use codec::{decode_frame, encode_frame};
pub use error::{JournalError, JournalResult};
pub use frame::{CommandPayload, JournalEntry};
