//! Low-level byte primitives for decoding Dragonfly's RDB and journal wire
//! formats: length-encoded integers, length-prefixed strings (including the
//! compact integer and LZF-compressed special encodings), and the
//! variable-length "packed" integer used by journal frames.
//!
//! Everything here is a pure function or a reader over a generic
//! [`std::io::Read`] source — no sockets, no async, so the container
//! decoders built on top of it (ziplist, listpack, intset, in `rdb`) can be
//! exhaustively unit tested.

mod error;
mod length;
mod lzf;
mod reader;
mod varint;

pub use error::{DecodeError, DecodeResult};
pub use length::Length;
pub use lzf::decompress as lzf_decompress;
pub use reader::{DecodedString, Reader};
pub use varint::{decode_packed_uint, encode_packed_uint};
