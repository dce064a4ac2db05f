//! crates/decode/src/varint.rs
//!
//! "Packed unsigned integer" encoding used within journal frames: a
//! variable-length base-128 integer with a continuation bit in the high bit
//! of each byte (little-endian group order, matching the journal's framing).

use crate::error::{DecodeError, DecodeResult};

/// Maximum number of groups a 64-bit packed integer can require.
const MAX_GROUPS: u32 = 10;

/// Decodes a packed unsigned integer from `bytes`, returning the value and
/// the number of bytes consumed.
pub fn decode_packed_uint(bytes: &[u8]) -> DecodeResult<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if i as u32 >= MAX_GROUPS {
            return Err(DecodeError::VarintOverflow);
        }
        let group = u64::from(byte & 0x7f);
        let shift = 7 * i as u32;
        value |= group
            .checked_shl(shift)
            .ok_or(DecodeError::VarintOverflow)?;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(DecodeError::VarintTruncated)
}

/// Encodes `value` as a packed unsigned integer, appending to `out`.
///
/// Used by tests to build fixtures; the production decoder only ever reads.
pub fn encode_packed_uint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_values() {
        for v in [0u64, 1, 63, 127, 128, 300] {
            let mut buf = Vec::new();
            encode_packed_uint(v, &mut buf);
            let (decoded, consumed) = decode_packed_uint(&buf).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn round_trips_large_values() {
        for v in [u64::from(u32::MAX), u64::MAX / 2, u64::MAX] {
            let mut buf = Vec::new();
            encode_packed_uint(v, &mut buf);
            let (decoded, _) = decode_packed_uint(&buf).unwrap();
            assert_eq!(decoded, v);
        }
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let err = decode_packed_uint(&[0x80, 0x80]).unwrap_err();
        assert!(matches!(err, DecodeError::VarintTruncated));
    }
}
