//! crates/decode/src/reader.rs
//!
//! A sequenced byte reader over any [`std::io::Read`] source, providing the
//! primitives the RDB and journal codecs are built from. The reader has no
//! knowledge of RESP, RDB opcodes, or journal frames — it only knows how to
//! pull length-encoded integers and strings off the wire in order.

use std::io::{self, Read};

use crate::error::{DecodeError, DecodeResult};
use crate::length::{self, Length, Pending};
use crate::lzf;
use crate::varint;

/// A string value read from the stream: either the byte payload itself, or
/// an integer that was stored in one of the compact integer encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedString {
    /// Raw bytes (the common case).
    Bytes(Vec<u8>),
    /// A small integer stored compactly; callers that need bytes should
    /// format it with [`DecodedString::into_bytes`].
    Int(i64),
}

impl DecodedString {
    /// Converts the value into its canonical byte representation.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Bytes(b) => b,
            Self::Int(n) => n.to_string().into_bytes(),
        }
    }
}

/// Special-length encoding tags recognised by [`Reader::read_string`].
mod special_tag {
    pub const INT8: u8 = 0;
    pub const INT16: u8 = 1;
    pub const INT32: u8 = 2;
    pub const LZF: u8 = 3;
}

/// Sequential reader over a byte source, exposing the RDB/journal primitives.
pub struct Reader<R> {
    inner: R,
    peeked: Option<u8>,
}

impl<R: Read> Reader<R> {
    /// Wraps `inner` in a new sequential reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
        }
    }

    /// Consumes the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Returns a mutable reference to the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    fn fill(&mut self, buf: &mut [u8]) -> DecodeResult<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                DecodeError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "short read"))
            } else {
                DecodeError::Io(e)
            }
        })
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> DecodeResult<u8> {
        if let Some(b) = self.peeked.take() {
            return Ok(b);
        }
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    /// Peeks at the next byte without consuming it.
    pub fn peek_u8(&mut self) -> DecodeResult<u8> {
        if let Some(b) = self.peeked {
            return Ok(b);
        }
        let b = self.read_u8()?;
        self.peeked = Some(b);
        Ok(b)
    }

    /// Reads a fixed number of raw bytes.
    pub fn read_exact_vec(&mut self, len: usize) -> DecodeResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf)?;
        Ok(buf)
    }

    /// Discards `len` bytes.
    pub fn skip(&mut self, len: usize) -> DecodeResult<()> {
        let mut remaining = len;
        let mut scratch = [0u8; 4096];
        while remaining > 0 {
            let chunk = remaining.min(scratch.len());
            self.fill(&mut scratch[..chunk])?;
            remaining -= chunk;
        }
        Ok(())
    }

    /// Reads a little-endian 32-bit unsigned integer.
    pub fn read_u32_le(&mut self) -> DecodeResult<u32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads a little-endian 64-bit unsigned integer.
    pub fn read_u64_le(&mut self) -> DecodeResult<u64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads a big-endian 64-bit unsigned integer.
    pub fn read_u64_be(&mut self) -> DecodeResult<u64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// Reads a little-endian IEEE-754 double.
    pub fn read_f64_le(&mut self) -> DecodeResult<f64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// Reads one length field, per §4.4's two-bit scheme dispatch.
    pub fn read_length(&mut self) -> DecodeResult<Length> {
        let first = self.read_u8()?;
        match length::classify(first) {
            Pending::Done(len) => Ok(len),
            Pending::OneByte { high } => {
                let low = self.read_u8()?;
                Ok(length::combine_14(high, low))
            }
            Pending::FourBytes => {
                let mut buf = [0u8; 4];
                self.fill(&mut buf)?;
                Ok(Length::Len(u64::from(u32::from_be_bytes(buf))))
            }
            Pending::EightBytes => {
                let value = self.read_u64_be()?;
                Ok(Length::Len(value))
            }
        }
    }

    /// Reads a packed (LEB128-style) unsigned integer.
    pub fn read_packed_uint(&mut self) -> DecodeResult<u64> {
        let mut buf = Vec::with_capacity(4);
        loop {
            let byte = self.read_u8()?;
            buf.push(byte);
            if byte & 0x80 == 0 {
                break;
            }
        }
        let (value, consumed) = varint::decode_packed_uint(&buf)?;
        debug_assert_eq!(consumed, buf.len());
        Ok(value)
    }

    /// Reads a length-prefixed string, resolving any special integer or
    /// LZF-compressed encoding.
    pub fn read_string(&mut self) -> DecodeResult<DecodedString> {
        match self.read_length()? {
            Length::Len(n) => {
                let bytes = self.read_exact_vec(n as usize)?;
                Ok(DecodedString::Bytes(bytes))
            }
            Length::Special(tag) => match tag {
                special_tag::INT8 => {
                    let v = self.read_u8()? as i8;
                    Ok(DecodedString::Int(i64::from(v)))
                }
                special_tag::INT16 => {
                    let mut buf = [0u8; 2];
                    self.fill(&mut buf)?;
                    Ok(DecodedString::Int(i64::from(i16::from_le_bytes(buf))))
                }
                special_tag::INT32 => {
                    let mut buf = [0u8; 4];
                    self.fill(&mut buf)?;
                    Ok(DecodedString::Int(i64::from(i32::from_le_bytes(buf))))
                }
                special_tag::LZF => {
                    let compressed_len = self.read_length()?.as_len().ok_or_else(|| {
                        DecodeError::Io(io::Error::other("LZF compressed length was itself special"))
                    })?;
                    let original_len = self.read_length()?.as_len().ok_or_else(|| {
                        DecodeError::Io(io::Error::other("LZF original length was itself special"))
                    })?;
                    let compressed = self.read_exact_vec(compressed_len as usize)?;
                    let decompressed = lzf::decompress(&compressed, original_len as usize)?;
                    Ok(DecodedString::Bytes(decompressed))
                }
                other => Err(DecodeError::Io(io::Error::other(format!(
                    "unsupported special string encoding tag {other}"
                )))),
            },
        }
    }

    /// Reads a length-prefixed string and unconditionally returns its bytes.
    pub fn read_string_bytes(&mut self) -> DecodeResult<Vec<u8>> {
        Ok(self.read_string()?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_of(bytes: &[u8]) -> Reader<&[u8]> {
        Reader::new(bytes)
    }

    #[test]
    fn six_bit_length() {
        let mut r = reader_of(&[0b0011_1111]);
        assert_eq!(r.read_length().unwrap(), Length::Len(63));
    }

    #[test]
    fn fourteen_bit_length() {
        let mut r = reader_of(&[0b0100_0001, 0x00]);
        assert_eq!(r.read_length().unwrap(), Length::Len(256));
    }

    #[test]
    fn thirty_two_bit_length() {
        let mut bytes = vec![0x80];
        bytes.extend_from_slice(&16384u32.to_be_bytes());
        let mut r = reader_of(&bytes);
        assert_eq!(r.read_length().unwrap(), Length::Len(16384));
    }

    #[test]
    fn sixty_four_bit_length() {
        let mut bytes = vec![0x81];
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());
        let mut r = reader_of(&bytes);
        assert_eq!(r.read_length().unwrap(), Length::Len(u64::MAX));
    }

    #[test]
    fn special_marker_is_distinguished_from_length() {
        let mut r = reader_of(&[0b1100_0000]);
        assert_eq!(r.read_length().unwrap(), Length::Special(0));
    }

    #[test]
    fn reads_plain_string() {
        let mut r = reader_of(&[0x03, b'k', b'e', b'y']);
        assert_eq!(
            r.read_string().unwrap(),
            DecodedString::Bytes(b"key".to_vec())
        );
    }

    #[test]
    fn reads_int8_encoded_string() {
        let mut r = reader_of(&[0b1100_0000, 0xFF]);
        assert_eq!(r.read_string().unwrap(), DecodedString::Int(-1));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut r = reader_of(&[0x42, 0x99]);
        assert_eq!(r.peek_u8().unwrap(), 0x42);
        assert_eq!(r.read_u8().unwrap(), 0x42);
        assert_eq!(r.read_u8().unwrap(), 0x99);
    }

    #[test]
    fn unexpected_eof_surfaces_as_io_error() {
        let mut r = reader_of(&[0x03, b'k']);
        let err = r.read_string().unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
