//! crates/rdb/src/intset.rs
//!
//! Pure decoder for the intset container: `[4-byte element width][4-byte
//! count][raw little-endian integers]`.

use crate::error::{RdbError, RdbResult};

fn bad(reason: impl Into<String>) -> RdbError {
    RdbError::MalformedContainer {
        container: "intset",
        reason: reason.into(),
    }
}

/// Decodes a complete intset blob into its members, as signed 64-bit integers.
pub fn decode(blob: &[u8]) -> RdbResult<Vec<i64>> {
    if blob.len() < 8 {
        return Err(bad("blob shorter than the fixed header"));
    }
    let width = u32::from_le_bytes(blob[0..4].try_into().unwrap()) as usize;
    let count = u32::from_le_bytes(blob[4..8].try_into().unwrap()) as usize;

    if !matches!(width, 2 | 4 | 8) {
        return Err(bad(format!("unsupported element width {width}")));
    }

    let body = &blob[8..];
    if body.len() < count * width {
        return Err(bad("blob shorter than count * width"));
    }

    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        let raw = &body[i * width..(i + 1) * width];
        let v = match width {
            2 => i64::from(i16::from_le_bytes(raw.try_into().unwrap())),
            4 => i64::from(i32::from_le_bytes(raw.try_into().unwrap())),
            8 => i64::from_le_bytes(raw.try_into().unwrap()),
            _ => unreachable!("width validated above"),
        };
        values.push(v);
    }
    Ok(values)
}

/// Encodes `values` as an intset blob using the narrowest width that fits
/// the maximum absolute value present. Used by tests and by round-trip
/// property checks; the decoder never needs to produce this format itself.
#[must_use]
pub fn encode(values: &[i64]) -> Vec<u8> {
    let width = values
        .iter()
        .map(|&v| {
            if i16::try_from(v).is_ok() {
                2
            } else if i32::try_from(v).is_ok() {
                4
            } else {
                8
            }
        })
        .max()
        .unwrap_or(2);

    let mut out = Vec::new();
    out.extend_from_slice(&(width as u32).to_le_bytes());
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for &v in values {
        match width {
            2 => out.extend_from_slice(&(v as i16).to_le_bytes()),
            4 => out.extend_from_slice(&(v as i32).to_le_bytes()),
            _ => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_values() {
        let values = vec![-3, 0, 1, 1000];
        let blob = encode(&values);
        assert_eq!(decode(&blob).unwrap(), values);
    }

    #[test]
    fn round_trips_values_requiring_64_bit_width() {
        let values = vec![i64::MIN, 0, i64::MAX];
        let blob = encode(&values);
        assert_eq!(decode(&blob).unwrap(), values);
    }

    #[test]
    fn rejects_unsupported_width() {
        let mut blob = vec![0u8; 8];
        blob[0..4].copy_from_slice(&3u32.to_le_bytes());
        assert!(decode(&blob).is_err());
    }

    #[test]
    fn rejects_truncated_body() {
        let mut blob = Vec::new();
        blob.extend_from_slice(&4u32.to_le_bytes());
        blob.extend_from_slice(&10u32.to_le_bytes());
        assert!(decode(&blob).is_err());
    }
}
