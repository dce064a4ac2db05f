//! crates/cluster/src/slot.rs
//!
//! The CRC16/XModem slot function and hash-tag extraction, per §4.2: the
//! CRC is taken over the brace-delimited hash tag when the key has a
//! non-empty one, otherwise over the whole key.

const SLOT_COUNT: u16 = 16384;

/// Computes the cluster slot for `key`.
#[must_use]
pub fn slot(key: &[u8]) -> u16 {
    crc16(hash_tag(key)) % SLOT_COUNT
}

/// Extracts the brace-delimited hash tag from `key`, or returns `key`
/// unchanged if there is none, or the braces enclose nothing.
#[must_use]
pub fn hash_tag(key: &[u8]) -> &[u8] {
    let Some(start) = key.iter().position(|&b| b == b'{') else {
        return key;
    };
    let Some(end_offset) = key[start + 1..].iter().position(|&b| b == b'}') else {
        return key;
    };
    let end = start + 1 + end_offset;
    if end == start + 1 {
        return key;
    }
    &key[start + 1..end]
}

/// CRC16/XModem, the variant Redis Cluster uses for slot assignment.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    const POLY: u16 = 0x1021;
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc16_matches_known_test_vector() {
        assert_eq!(crc16(b"123456789"), 12739);
    }

    #[test]
    fn hash_tagged_keys_collide_on_the_tag() {
        assert_eq!(slot(b"{user1000}.following"), slot(b"{user1000}.followers"));
    }

    #[test]
    fn keys_without_a_tag_use_the_whole_key() {
        let s = slot(b"abc");
        assert!(s < SLOT_COUNT);
    }

    #[test]
    fn empty_braces_fall_back_to_the_whole_key() {
        assert_eq!(hash_tag(b"foo{}bar"), b"foo{}bar".as_slice());
    }

    #[test]
    fn unmatched_open_brace_falls_back_to_the_whole_key() {
        assert_eq!(hash_tag(b"foo{bar"), b"foo{bar".as_slice());
    }

    #[test]
    fn nested_braces_use_the_first_closing_brace() {
        assert_eq!(hash_tag(b"{a{b}c}"), b"a{b".as_slice());
    }
}
