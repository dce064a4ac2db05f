//! crates/rdb/src/stream.rs
//!
//! Decodes a STREAM value (type codes 15/19/21) into its reconstructed
//! messages. Consumer-group state is parsed only to advance the cursor
//! correctly; it is never forwarded downstream, per the data model's
//! Non-goal around source-specific auxiliary structures.

use std::io::Read;

use decode::Reader;

use crate::entry::StreamMessage;
use crate::error::RdbResult;
use crate::listpack::{self, LpEntry};

/// Which of the three stream type codes is being decoded; the trailer's
/// version-dependent extra fields only appear on the two newer ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEncoding {
    /// Type code 15 (`STREAM_LISTPACKS`): length and last-id only.
    Listpacks,
    /// Type codes 19/21 (`STREAM_LISTPACKS_2`/`_3`): also carry first-id,
    /// max-deleted-id, entries-added, and per-group `entries_read`.
    ListpacksWithExtras,
}

/// Decodes a stream value, per §4.5.3's node/listpack layout. `encoding`
/// selects whether the trailer's version-dependent extra fields are
/// present; passing the wrong one desyncs the cursor for the rest of the
/// snapshot.
pub fn decode<R: Read>(reader: &mut Reader<R>, encoding: StreamEncoding) -> RdbResult<Vec<StreamMessage>> {
    let node_count = reader.read_packed_uint()?;
    let mut messages = Vec::new();

    for _ in 0..node_count {
        let master_ms = reader.read_u64_be()?;
        let master_seq = reader.read_u64_be()?;
        let blob = reader.read_string_bytes()?;
        decode_node(master_ms, master_seq, &blob, &mut messages)?;
    }

    // Stream metadata trailer: length, last-id, and (on the newer type
    // codes) version-dependent extra fields, followed by the
    // consumer-group section. None of it changes the reconstructed
    // message list, but it must still be consumed so the cursor lands
    // correctly for whatever opcode follows.
    let _length = reader.read_packed_uint()?;
    let _last_id_ms = reader.read_u64_be()?;
    let _last_id_seq = reader.read_u64_be()?;
    if encoding == StreamEncoding::ListpacksWithExtras {
        let _first_id_ms = reader.read_u64_be()?;
        let _first_id_seq = reader.read_u64_be()?;
        let _max_deleted_ms = reader.read_u64_be()?;
        let _max_deleted_seq = reader.read_u64_be()?;
        let _entries_added = reader.read_packed_uint()?;
    }

    let group_count = reader.read_packed_uint()?;
    for _ in 0..group_count {
        skip_consumer_group(reader, encoding)?;
    }

    Ok(messages)
}

fn decode_node(
    master_ms: u64,
    master_seq: u64,
    blob: &[u8],
    out: &mut Vec<StreamMessage>,
) -> RdbResult<()> {
    let entries = listpack::decode(blob)?;
    let mut cursor = entries.into_iter();

    let _count = next_int(&mut cursor)?;
    let master_field_count = next_int(&mut cursor)?;
    let mut master_fields = Vec::with_capacity(master_field_count as usize);
    for _ in 0..master_field_count {
        master_fields.push(next_bytes(&mut cursor)?);
    }

    loop {
        let flags = match cursor.next() {
            Some(entry) => as_int(entry),
            None => break,
        };
        let ms_delta = next_int(&mut cursor)?;
        let seq_field = next_int(&mut cursor)?;
        let field_count = next_int(&mut cursor)?;

        let id_ms = master_ms.wrapping_add(ms_delta as u64);
        let id_seq = if field_count < 0 {
            seq_field as u64
        } else {
            master_seq.wrapping_add(seq_field as u64)
        };

        let fields = if field_count < 0 {
            let mut values = Vec::with_capacity(master_fields.len());
            for name in &master_fields {
                values.push((name.clone(), next_bytes(&mut cursor)?));
            }
            values
        } else {
            let mut values = Vec::with_capacity(field_count as usize);
            for _ in 0..field_count {
                let name = next_bytes(&mut cursor)?;
                let value = next_bytes(&mut cursor)?;
                values.push((name, value));
            }
            values
        };

        let _ = flags;
        out.push(StreamMessage {
            id_ms,
            id_seq,
            fields,
        });
    }

    Ok(())
}

fn next_int(cursor: &mut impl Iterator<Item = LpEntry>) -> RdbResult<i64> {
    let entry = cursor.next().ok_or_else(too_short)?;
    Ok(as_int(entry))
}

fn next_bytes(cursor: &mut impl Iterator<Item = LpEntry>) -> RdbResult<Vec<u8>> {
    cursor.next().ok_or_else(too_short).map(LpEntry::into_bytes)
}

fn as_int(entry: LpEntry) -> i64 {
    match entry {
        LpEntry::Int(n) => n,
        LpEntry::Bytes(b) => String::from_utf8_lossy(&b).parse().unwrap_or(0),
    }
}

fn too_short() -> crate::error::RdbError {
    crate::error::RdbError::MalformedContainer {
        container: "stream-node-listpack",
        reason: "ran out of entries while reconstructing a message".to_string(),
    }
}

fn skip_consumer_group<R: Read>(reader: &mut Reader<R>, encoding: StreamEncoding) -> RdbResult<()> {
    let _name = reader.read_string_bytes()?;
    let _last_id_ms = reader.read_u64_be()?;
    let _last_id_seq = reader.read_u64_be()?;
    if encoding == StreamEncoding::ListpacksWithExtras {
        let _entries_read = reader.read_packed_uint()?;
    }

    let pel_count = reader.read_packed_uint()?;
    for _ in 0..pel_count {
        let _id_ms = reader.read_u64_be()?;
        let _id_seq = reader.read_u64_be()?;
        let _delivery_time = reader.read_u64_le()?;
        let _delivery_count = reader.read_packed_uint()?;
    }

    let consumer_count = reader.read_packed_uint()?;
    for _ in 0..consumer_count {
        let _consumer_name = reader.read_string_bytes()?;
        let _seen_time = reader.read_u64_le()?;
        let consumer_pel_count = reader.read_packed_uint()?;
        for _ in 0..consumer_pel_count {
            let _id_ms = reader.read_u64_be()?;
            let _id_seq = reader.read_u64_be()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lp_encode(entries: &[LpEntry]) -> Vec<u8> {
        // Minimal listpack encoder covering the entry shapes this module's
        // tests exercise (small immediates and short strings), mirroring
        // `listpack::decode`'s supported subset.
        let mut body = Vec::new();
        for entry in entries {
            match entry {
                LpEntry::Int(n) if (0..=127).contains(n) => {
                    body.push(*n as u8);
                    body.push(1);
                }
                LpEntry::Int(n) => {
                    body.push(0xF1);
                    body.extend_from_slice(&(*n as i16).to_le_bytes());
                    body.push(3);
                }
                LpEntry::Bytes(b) => {
                    body.push(0x80 | (b.len() as u8));
                    body.extend_from_slice(b);
                    body.push((1 + b.len()) as u8);
                }
            }
        }
        body.push(0xFF);
        let mut blob = vec![0u8; 6];
        blob.extend(body);
        blob
    }

    #[test]
    fn decodes_single_message_with_own_fields() {
        let node = lp_encode(&[
            LpEntry::Int(1), // count
            LpEntry::Int(1), // master field count
            LpEntry::Bytes(b"unused".to_vec()),
            LpEntry::Int(0),             // flags
            LpEntry::Int(0),             // ms delta
            LpEntry::Int(0),             // seq (absolute, since field_count >= 0)
            LpEntry::Int(1),             // field count
            LpEntry::Bytes(b"f".to_vec()),
            LpEntry::Bytes(b"v".to_vec()),
        ]);

        let mut stream_bytes = Vec::new();
        decode::encode_packed_uint(1, &mut stream_bytes); // node count
        stream_bytes.extend_from_slice(&100u64.to_be_bytes());
        stream_bytes.extend_from_slice(&0u64.to_be_bytes());
        stream_bytes.push(node.len() as u8); // length-prefixed blob (6-bit length)
        stream_bytes.extend_from_slice(&node);
        // trailer
        decode::encode_packed_uint(1, &mut stream_bytes); // length
        stream_bytes.extend_from_slice(&100u64.to_be_bytes());
        stream_bytes.extend_from_slice(&0u64.to_be_bytes());
        stream_bytes.extend_from_slice(&100u64.to_be_bytes());
        stream_bytes.extend_from_slice(&0u64.to_be_bytes());
        stream_bytes.extend_from_slice(&0u64.to_be_bytes());
        stream_bytes.extend_from_slice(&0u64.to_be_bytes());
        decode::encode_packed_uint(1, &mut stream_bytes); // entries_added
        decode::encode_packed_uint(0, &mut stream_bytes); // group count

        let mut reader = Reader::new(stream_bytes.as_slice());
        let messages = decode(&mut reader, StreamEncoding::ListpacksWithExtras).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id_ms, 100);
        assert_eq!(messages[0].id_seq, 0);
        assert_eq!(messages[0].fields, vec![(b"f".to_vec(), b"v".to_vec())]);
    }

    #[test]
    fn listpacks_encoding_has_no_trailer_extras() {
        let node = lp_encode(&[
            LpEntry::Int(1),
            LpEntry::Int(1),
            LpEntry::Bytes(b"unused".to_vec()),
            LpEntry::Int(0),
            LpEntry::Int(0),
            LpEntry::Int(0),
            LpEntry::Int(1),
            LpEntry::Bytes(b"f".to_vec()),
            LpEntry::Bytes(b"v".to_vec()),
        ]);

        let mut stream_bytes = Vec::new();
        decode::encode_packed_uint(1, &mut stream_bytes); // node count
        stream_bytes.extend_from_slice(&100u64.to_be_bytes());
        stream_bytes.extend_from_slice(&0u64.to_be_bytes());
        stream_bytes.push(node.len() as u8);
        stream_bytes.extend_from_slice(&node);
        // trailer: length, last-id only — no first-id/max-deleted/entries-added.
        decode::encode_packed_uint(1, &mut stream_bytes);
        stream_bytes.extend_from_slice(&100u64.to_be_bytes());
        stream_bytes.extend_from_slice(&0u64.to_be_bytes());
        decode::encode_packed_uint(0, &mut stream_bytes); // group count

        let mut reader = Reader::new(stream_bytes.as_slice());
        let messages = decode(&mut reader, StreamEncoding::Listpacks).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id_ms, 100);
    }
}
