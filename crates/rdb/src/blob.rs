//! crates/rdb/src/blob.rs
//!
//! Decompresses the ZSTD (`0xC9`) and LZ4 (`0xCA`) blob windows the decoder
//! encounters mid-snapshot. Grounded in the same "decompress a whole frame
//! into a `Vec<u8>`" shape the workspace's compression crate uses for its
//! own ZSTD/LZ4 helpers, simplified here since the decoder only ever reads
//! a window once, start to end.

use crate::error::{RdbError, RdbResult};

/// Decompresses a complete ZSTD frame.
pub fn decompress_zstd(compressed: &[u8]) -> RdbResult<Vec<u8>> {
    zstd::stream::decode_all(compressed).map_err(|e| RdbError::Zstd(e.to_string()))
}

/// Decompresses a complete LZ4 frame.
pub fn decompress_lz4(compressed: &[u8]) -> RdbResult<Vec<u8>> {
    use std::io::Read;
    let mut decoder = lz4_flex::frame::FrameDecoder::new(compressed);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| RdbError::Lz4(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zstd_round_trips() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let compressed = zstd::stream::encode_all(&original[..], 3).unwrap();
        assert_eq!(decompress_zstd(&compressed).unwrap(), original);
    }

    #[test]
    fn lz4_round_trips() {
        let original = b"the quick brown fox jumps over the lazy dog".repeat(4);
        let mut compressed = Vec::new();
        {
            use std::io::Write;
            let mut encoder = lz4_flex::frame::FrameEncoder::new(&mut compressed);
            encoder.write_all(&original).unwrap();
            encoder.finish().unwrap();
        }
        assert_eq!(decompress_lz4(&compressed).unwrap(), original);
    }

    #[test]
    fn bad_zstd_frame_is_an_error() {
        assert!(decompress_zstd(&[0, 1, 2, 3]).is_err());
    }
}
