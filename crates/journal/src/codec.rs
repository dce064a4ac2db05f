//! crates/journal/src/codec.rs
//!
//! Decodes one journal frame at a time off a [`decode::Reader`]. A frame is
//! a one-byte opcode followed by an opcode-specific body; `COMMAND` and
//! `EXPIRED` share the same payload-block shape.

use std::io::Read;

use decode::Reader;

use crate::error::{JournalError, JournalResult};
use crate::frame::{CommandPayload, JournalEntry};

const OP_NOOP: u8 = 0;
const OP_SELECT: u8 = 6;
const OP_EXPIRED: u8 = 9;
const OP_COMMAND: u8 = 10;
const OP_PING: u8 = 13;
const OP_LSN: u8 = 15;

/// Reads one journal frame from `reader`.
pub fn decode_frame<R: Read>(reader: &mut Reader<R>) -> JournalResult<JournalEntry> {
    let opcode = reader.read_u8()?;
    match opcode {
        OP_NOOP => Ok(JournalEntry::Noop),
        OP_SELECT => {
            let db = reader.read_packed_uint()?;
            Ok(JournalEntry::Select(db as u32))
        }
        OP_EXPIRED => Ok(JournalEntry::Expired(decode_payload(reader)?)),
        OP_COMMAND => Ok(JournalEntry::Command(decode_payload(reader)?)),
        OP_PING => Ok(JournalEntry::Ping),
        OP_LSN => {
            let lsn = reader.read_packed_uint()?;
            Ok(JournalEntry::Lsn(lsn))
        }
        other => Err(JournalError::UnknownOpcode(other)),
    }
}

fn decode_payload<R: Read>(reader: &mut Reader<R>) -> JournalResult<CommandPayload> {
    let txid = reader.read_packed_uint()?;
    let shard_count = reader.read_packed_uint()? as u32;
    let element_count = reader.read_packed_uint()?;
    let _total_size_hint = reader.read_packed_uint()?;

    if element_count == 0 {
        return Err(JournalError::EmptyPayload);
    }

    let name = reader.read_string_bytes()?;
    let mut args = Vec::with_capacity((element_count - 1) as usize);
    for _ in 1..element_count {
        args.push(reader.read_string_bytes()?);
    }

    Ok(CommandPayload {
        txid,
        shard_count,
        name,
        args,
    })
}

/// Encodes one journal frame. Used by tests and by any caller that needs to
/// re-emit a frame (e.g. the inline-journal-blob framing within an RDB
/// snapshot uses the same wire shape).
#[must_use]
pub fn encode_frame(entry: &JournalEntry) -> Vec<u8> {
    let mut out = vec![entry.opcode()];
    match entry {
        JournalEntry::Noop | JournalEntry::Ping => {}
        JournalEntry::Select(db) => decode::encode_packed_uint(u64::from(*db), &mut out),
        JournalEntry::Lsn(lsn) => decode::encode_packed_uint(*lsn, &mut out),
        JournalEntry::Expired(payload) | JournalEntry::Command(payload) => {
            encode_payload(payload, &mut out);
        }
    }
    out
}

fn encode_payload(payload: &CommandPayload, out: &mut Vec<u8>) {
    decode::encode_packed_uint(payload.txid, out);
    decode::encode_packed_uint(u64::from(payload.shard_count), out);
    let element_count = 1 + payload.args.len() as u64;
    decode::encode_packed_uint(element_count, out);
    let body_size: usize = payload.name.len() + payload.args.iter().map(Vec::len).sum::<usize>();
    decode::encode_packed_uint(body_size as u64, out);
    encode_string(&payload.name, out);
    for arg in &payload.args {
        encode_string(arg, out);
    }
}

fn encode_string(bytes: &[u8], out: &mut Vec<u8>) {
    // A length under 64 fits the 6-bit scheme; larger bodies use the 32-bit
    // scheme. Journal command names and arguments in practice are well
    // under the 14-bit threshold, so this covers the cases tests exercise.
    if bytes.len() < 64 {
        out.push(bytes.len() as u8);
    } else {
        out.push(0x80);
        out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    }
    out.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(entry: JournalEntry) -> JournalEntry {
        let bytes = encode_frame(&entry);
        let mut reader = Reader::new(bytes.as_slice());
        decode_frame(&mut reader).unwrap()
    }

    #[test]
    fn round_trips_noop_and_ping() {
        assert_eq!(round_trip(JournalEntry::Noop), JournalEntry::Noop);
        assert_eq!(round_trip(JournalEntry::Ping), JournalEntry::Ping);
    }

    #[test]
    fn round_trips_select() {
        assert_eq!(round_trip(JournalEntry::Select(7)), JournalEntry::Select(7));
    }

    #[test]
    fn round_trips_lsn() {
        assert_eq!(round_trip(JournalEntry::Lsn(123_456)), JournalEntry::Lsn(123_456));
    }

    #[test]
    fn round_trips_command_with_args() {
        let payload = CommandPayload {
            txid: 77,
            shard_count: 2,
            name: b"SET".to_vec(),
            args: vec![b"k".to_vec(), b"v".to_vec()],
        };
        let entry = JournalEntry::Command(payload.clone());
        assert_eq!(round_trip(entry), JournalEntry::Command(payload));
    }

    #[test]
    fn round_trips_expired() {
        let payload = CommandPayload {
            txid: 0,
            shard_count: 1,
            name: b"PEXPIRE".to_vec(),
            args: vec![b"k".to_vec(), b"1".to_vec()],
        };
        let entry = JournalEntry::Expired(payload.clone());
        assert_eq!(round_trip(entry), JournalEntry::Expired(payload));
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        let mut reader = Reader::new([0xEFu8].as_slice());
        assert!(matches!(
            decode_frame(&mut reader),
            Err(JournalError::UnknownOpcode(0xEF))
        ));
    }

    #[test]
    fn zero_element_count_is_an_error() {
        // opcode COMMAND, txid=0, shard_count=1, element_count=0
        let bytes = vec![OP_COMMAND, 0, 1, 0];
        let mut reader = Reader::new(bytes.as_slice());
        assert!(matches!(
            decode_frame(&mut reader),
            Err(JournalError::EmptyPayload)
        ));
    }
}
