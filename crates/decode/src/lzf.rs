//! crates/decode/src/lzf.rs
//!
//! LZF decompression, used for the "special" length-prefixed-string encoding
//! that frames a `(compressed_len, original_len, compressed_bytes)` triple.
//! LZF streams alternate literal runs (control byte < 32) with
//! back-references (control byte >= 32) into the already-produced output.

use crate::error::{DecodeError, DecodeResult};

/// Decompresses an LZF-encoded buffer, expecting exactly `expected_len`
/// output bytes.
pub fn decompress(input: &[u8], expected_len: usize) -> DecodeResult<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut ip = 0usize;

    while ip < input.len() {
        let ctrl = input[ip] as usize;
        ip += 1;

        if ctrl < 32 {
            let len = ctrl + 1;
            let end = ip
                .checked_add(len)
                .filter(|&e| e <= input.len())
                .ok_or(DecodeError::LzfTruncated)?;
            out.extend_from_slice(&input[ip..end]);
            ip = end;
        } else {
            let mut len = ctrl >> 5;
            let mut ref_offset = (ctrl & 0x1f) << 8;

            if len == 7 {
                let extra = *input.get(ip).ok_or(DecodeError::LzfTruncated)?;
                len += extra as usize;
                ip += 1;
            }
            let low = *input.get(ip).ok_or(DecodeError::LzfTruncated)?;
            ip += 1;
            ref_offset |= low as usize;

            let mut ref_pos = out
                .len()
                .checked_sub(ref_offset + 1)
                .ok_or(DecodeError::LzfBadReference)?;
            len += 2;
            for _ in 0..len {
                let byte = *out.get(ref_pos).ok_or(DecodeError::LzfBadReference)?;
                out.push(byte);
                ref_pos += 1;
            }
        }
    }

    if out.len() != expected_len {
        return Err(DecodeError::LzfLengthMismatch {
            expected: expected_len,
            actual: out.len(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compress_literal(data: &[u8]) -> Vec<u8> {
        // Minimal encoder good enough for round-trip tests: emits chunks of
        // at most 32 bytes as literal runs, never emitting back-references.
        let mut out = Vec::new();
        for chunk in data.chunks(32) {
            out.push((chunk.len() - 1) as u8);
            out.extend_from_slice(chunk);
        }
        out
    }

    #[test]
    fn round_trips_literal_only_stream() {
        let data = b"the quick brown fox jumps over the lazy dog, a classic pangram";
        let compressed = compress_literal(data);
        let decompressed = decompress(&compressed, data.len()).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn decodes_back_reference() {
        // Literal "ab", then a back-reference of length 2 (ctrl=32|0=32,
        // low byte offset=1 => copy from position len-1-1=0) repeating "ab".
        let mut input = vec![1u8, b'a', b'b'];
        input.push(32); // ctrl: len bits = 0 -> len=2, high offset bits = 0
        input.push(1); // offset low byte -> ref_offset = 1 -> ref_pos = 2-1-1 = 0
        let out = decompress(&input, 4).unwrap();
        assert_eq!(out, b"abab");
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let compressed = compress_literal(b"abc");
        let err = decompress(&compressed, 10).unwrap_err();
        assert!(matches!(err, DecodeError::LzfLengthMismatch { .. }));
    }

    #[test]
    fn bad_reference_is_an_error() {
        let input = vec![32u8, 5];
        let err = decompress(&input, 2).unwrap_err();
        assert!(matches!(err, DecodeError::LzfBadReference));
    }
}
