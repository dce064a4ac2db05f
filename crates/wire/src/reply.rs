//! crates/wire/src/reply.rs
//!
//! The four RESP reply kinds, plus the async parser that reads one reply off
//! a buffered connection. A bulk length of -1 decodes to [`Reply::Nil`]; a
//! nested array reply recurses through the same parser.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{WireError, WireResult};

/// One parsed RESP reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK\r\n`-style simple status line.
    Status(String),
    /// `-ERR message\r\n`-style error line.
    Error(String),
    /// `:123\r\n`-style integer.
    Integer(i64),
    /// `$N\r\n<N bytes>\r\n`-style bulk string.
    Bulk(Vec<u8>),
    /// `$-1\r\n` or `*-1\r\n`: a null bulk string or array.
    Nil,
    /// `*N\r\n`-style array of further replies.
    Array(Vec<Reply>),
}

impl Reply {
    /// Returns the bulk payload, if this reply is a non-nil bulk string.
    #[must_use]
    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            Self::Bulk(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the array elements, if this reply is a non-nil array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns `true` if this reply is a status line equal to `OK` (case-sensitive).
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Status(s) if s == "OK")
    }

    /// Returns the error message, if this reply is an error.
    #[must_use]
    pub fn as_error(&self) -> Option<&str> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// Reads one CRLF-terminated line, stripping the trailing `\r\n`.
async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> WireResult<String> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(WireError::Transport(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed while reading a reply line",
        )));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn parse_len(raw: &str, what: &str) -> WireResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| WireError::protocol(format!("invalid {what} length: {raw:?}")))
}

/// Reads and parses one RESP reply from `reader`.
pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> WireResult<Reply> {
    let line = read_line(reader).await?;
    if line.is_empty() {
        return Err(WireError::protocol("empty reply line"));
    }
    let (marker, rest) = line.split_at(1);

    match marker {
        "+" => Ok(Reply::Status(rest.to_owned())),
        "-" => Ok(Reply::Error(rest.to_owned())),
        ":" => Ok(Reply::Integer(parse_len(rest, "integer")?)),
        "$" => {
            let len = parse_len(rest, "bulk")?;
            if len < 0 {
                return Ok(Reply::Nil);
            }
            let len = len as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            let mut crlf = [0u8; 2];
            reader.read_exact(&mut crlf).await?;
            Ok(Reply::Bulk(buf))
        }
        "*" => {
            let len = parse_len(rest, "array")?;
            if len < 0 {
                return Ok(Reply::Nil);
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(Box::pin(read_reply(reader)).await?);
            }
            Ok(Reply::Array(items))
        }
        other => Err(WireError::protocol(format!(
            "unrecognized reply marker {other:?}"
        ))),
    }
}

/// Encodes a command and its arguments as a RESP array of bulk strings.
pub fn encode_command(command: &str, args: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("*{}\r\n", args.len() + 1).as_bytes());
    encode_bulk(command.as_bytes(), &mut out);
    for arg in args {
        encode_bulk(arg, &mut out);
    }
    out
}

fn encode_bulk(bytes: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(format!("${}\r\n", bytes.len()).as_bytes());
    out.extend_from_slice(bytes);
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn parse(bytes: &[u8]) -> WireResult<Reply> {
        let mut cursor = Cursor::new(bytes.to_vec());
        read_reply(&mut cursor).await
    }

    #[tokio::test]
    async fn parses_status() {
        assert_eq!(
            parse(b"+OK\r\n").await.unwrap(),
            Reply::Status("OK".into())
        );
    }

    #[tokio::test]
    async fn parses_error() {
        assert_eq!(
            parse(b"-ERR bad\r\n").await.unwrap(),
            Reply::Error("ERR bad".into())
        );
    }

    #[tokio::test]
    async fn parses_integer() {
        assert_eq!(parse(b":42\r\n").await.unwrap(), Reply::Integer(42));
    }

    #[tokio::test]
    async fn parses_bulk_string() {
        assert_eq!(
            parse(b"$3\r\nfoo\r\n").await.unwrap(),
            Reply::Bulk(b"foo".to_vec())
        );
    }

    #[tokio::test]
    async fn parses_null_bulk_string() {
        assert_eq!(parse(b"$-1\r\n").await.unwrap(), Reply::Nil);
    }

    #[tokio::test]
    async fn parses_nested_array() {
        let reply = parse(b"*2\r\n$3\r\nfoo\r\n*1\r\n:1\r\n").await.unwrap();
        assert_eq!(
            reply,
            Reply::Array(vec![
                Reply::Bulk(b"foo".to_vec()),
                Reply::Array(vec![Reply::Integer(1)])
            ])
        );
    }

    #[tokio::test]
    async fn parses_null_array() {
        assert_eq!(parse(b"*-1\r\n").await.unwrap(), Reply::Nil);
    }

    #[tokio::test]
    async fn malformed_marker_is_a_protocol_error() {
        let err = parse(b"?1\r\n").await.unwrap_err();
        assert!(matches!(err, WireError::Protocol(_)));
    }

    #[tokio::test]
    async fn truncated_stream_is_a_transport_error() {
        let err = parse(b"").await.unwrap_err();
        assert!(matches!(err, WireError::Transport(_)));
    }

    #[test]
    fn encodes_command_as_resp_array() {
        let encoded = encode_command("SET", &[b"k", b"v"]);
        assert_eq!(encoded, b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n");
    }
}
