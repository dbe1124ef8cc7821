//! A frame of the wire protocol, plus the stateless codec for it.
//!
//! Replies are decoded in two passes: `check` scans the buffered bytes to
//! decide whether one complete frame is present (without allocating), then
//! `parse` materializes it. The connection only consumes bytes once `check`
//! succeeds, so a reply is either decoded whole or not consumed at all.

use std::fmt;
use std::io::Cursor;

use bytes::{Buf, Bytes};

/// A single protocol frame: the unit both requests and replies are made of.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// `+...` simple string.
    Simple(String),
    /// `-...` error reply, surfaced verbatim by the transport.
    Error(String),
    /// `:n` signed 64-bit integer.
    Integer(i64),
    /// `$len` bulk string; binary clean.
    Bulk(Bytes),
    /// `$-1`, the nil bulk string. Distinct from an empty `Bulk`.
    Null,
    /// `*n` array of frames.
    Array(Vec<Frame>),
    /// `*-1`, the nil array, e.g. an aborted transaction's `EXEC` reply.
    NullArray,
}

#[derive(Debug)]
pub(crate) enum DecodeError {
    /// More data must be buffered before a full frame can be decoded.
    Incomplete,
    /// Framing violation; the connection must be torn down.
    Invalid(String),
}

impl Frame {
    /// Checks whether a complete frame can be decoded from `src`, advancing
    /// the cursor past it. Declared bulk lengths and array element counts
    /// above `max_len` are framing violations.
    pub(crate) fn check(src: &mut Cursor<&[u8]>, max_len: usize) -> Result<(), DecodeError> {
        match get_u8(src)? {
            b'+' | b'-' => {
                get_line(src)?;
                Ok(())
            }
            b':' => {
                get_decimal(src)?;
                Ok(())
            }
            b'$' => {
                let len = get_decimal(src)?;
                if len < 0 {
                    // The nil bulk carries no payload line.
                    return Ok(());
                }
                let len = bounded_len(len, max_len)?;
                // Payload plus trailing CRLF.
                skip(src, len + 2)
            }
            b'*' => {
                let count = get_decimal(src)?;
                if count < 0 {
                    return Ok(());
                }
                let count = bounded_len(count, max_len)?;
                for _ in 0..count {
                    Frame::check(src, max_len)?;
                }
                Ok(())
            }
            byte => Err(DecodeError::Invalid(format!(
                "invalid frame type byte `{}`",
                byte as char
            ))),
        }
    }

    /// Parses a frame already validated by [`Frame::check`].
    pub(crate) fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, DecodeError> {
        match get_u8(src)? {
            b'+' => {
                let line = get_line(src)?.to_vec();
                let string = String::from_utf8(line)
                    .map_err(|_| DecodeError::Invalid("invalid simple string".into()))?;
                Ok(Frame::Simple(string))
            }
            b'-' => {
                let line = get_line(src)?.to_vec();
                let string = String::from_utf8(line)
                    .map_err(|_| DecodeError::Invalid("invalid error string".into()))?;
                Ok(Frame::Error(string))
            }
            b':' => Ok(Frame::Integer(get_decimal(src)?)),
            b'$' => {
                let len = get_decimal(src)?;
                if len < 0 {
                    return Ok(Frame::Null);
                }
                let len = len as usize;
                if src.remaining() < len + 2 {
                    return Err(DecodeError::Incomplete);
                }
                let data = Bytes::copy_from_slice(&src.chunk()[..len]);
                // Payload plus trailing CRLF.
                skip(src, len + 2)?;
                Ok(Frame::Bulk(data))
            }
            b'*' => {
                let count = get_decimal(src)?;
                if count < 0 {
                    return Ok(Frame::NullArray);
                }
                let mut out = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    out.push(Frame::parse(src)?);
                }
                Ok(Frame::Array(out))
            }
            byte => Err(DecodeError::Invalid(format!(
                "invalid frame type byte `{}`",
                byte as char
            ))),
        }
    }

    /// Encodes the frame into `dst` in wire form. Total on every frame.
    pub(crate) fn write_to(&self, dst: &mut Vec<u8>) {
        match self {
            Frame::Simple(val) => {
                dst.push(b'+');
                dst.extend_from_slice(val.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Error(val) => {
                dst.push(b'-');
                dst.extend_from_slice(val.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Integer(val) => {
                dst.push(b':');
                dst.extend_from_slice(val.to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Bulk(val) => {
                dst.push(b'$');
                dst.extend_from_slice(val.len().to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
                dst.extend_from_slice(val);
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Null => dst.extend_from_slice(b"$-1\r\n"),
            Frame::Array(val) => {
                dst.push(b'*');
                dst.extend_from_slice(val.len().to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
                for entry in val {
                    entry.write_to(dst);
                }
            }
            Frame::NullArray => dst.extend_from_slice(b"*-1\r\n"),
        }
    }
}

/// Builder helper for assembling array frames.
pub(crate) trait PushFrame {
    fn push_bulk(&mut self, bytes: Bytes);
}

impl PushFrame for Vec<Frame> {
    fn push_bulk(&mut self, bytes: Bytes) {
        self.push(Frame::Bulk(bytes));
    }
}

impl From<Vec<Frame>> for Frame {
    fn from(parts: Vec<Frame>) -> Frame {
        Frame::Array(parts)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Incomplete => "incomplete frame".fmt(f),
            DecodeError::Invalid(msg) => msg.fmt(f),
        }
    }
}

impl From<DecodeError> for crate::Error {
    fn from(err: DecodeError) -> crate::Error {
        crate::Error::Protocol(err.to_string())
    }
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, DecodeError> {
    if !src.has_remaining() {
        return Err(DecodeError::Incomplete);
    }
    Ok(src.get_u8())
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> Result<(), DecodeError> {
    if src.remaining() < n {
        return Err(DecodeError::Incomplete);
    }
    src.advance(n);
    Ok(())
}

/// Reads one decimal-ASCII line as a signed 64-bit integer.
fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, DecodeError> {
    let line = get_line(src)?;

    atoi::atoi::<i64>(line).ok_or_else(|| DecodeError::Invalid("invalid decimal line".into()))
}

/// Finds a `\r\n`-terminated line, advancing the cursor past it.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], DecodeError> {
    let start = src.position() as usize;
    let end = src.get_ref().len();
    if end < 2 {
        return Err(DecodeError::Incomplete);
    }

    for i in start..end - 1 {
        if src.get_ref()[i] == b'\r' && src.get_ref()[i + 1] == b'\n' {
            src.set_position((i + 2) as u64);
            return Ok(&src.get_ref()[start..i]);
        }
    }

    Err(DecodeError::Incomplete)
}

fn bounded_len(declared: i64, max_len: usize) -> Result<usize, DecodeError> {
    let declared = declared as u64;
    if declared > max_len as u64 {
        return Err(DecodeError::Invalid(format!(
            "declared length {declared} exceeds the configured maximum of {max_len}"
        )));
    }
    Ok(declared as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    fn decode(input: &[u8]) -> Result<Frame, DecodeError> {
        let mut cursor = Cursor::new(input);
        Frame::check(&mut cursor, MAX)?;
        let consumed = cursor.position() as usize;
        assert_eq!(consumed, input.len(), "check must consume the whole frame");
        cursor.set_position(0);
        Frame::parse(&mut cursor)
    }

    fn round_trip(frame: &Frame) {
        let mut encoded = Vec::new();
        frame.write_to(&mut encoded);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(&decoded, frame);
    }

    #[test]
    fn decodes_every_reply_kind() {
        assert_eq!(decode(b"+OK\r\n").unwrap(), Frame::Simple("OK".into()));
        assert_eq!(
            decode(b"-ERR boom\r\n").unwrap(),
            Frame::Error("ERR boom".into())
        );
        assert_eq!(decode(b":-42\r\n").unwrap(), Frame::Integer(-42));
        assert_eq!(
            decode(b"$3\r\nbar\r\n").unwrap(),
            Frame::Bulk(Bytes::from_static(b"bar"))
        );
        assert_eq!(decode(b"$-1\r\n").unwrap(), Frame::Null);
        assert_eq!(decode(b"*-1\r\n").unwrap(), Frame::NullArray);
        assert_eq!(
            decode(b"*2\r\n$3\r\nfoo\r\n:7\r\n").unwrap(),
            Frame::Array(vec![
                Frame::Bulk(Bytes::from_static(b"foo")),
                Frame::Integer(7)
            ])
        );
    }

    #[test]
    fn nil_bulk_is_not_the_empty_bulk() {
        let nil = decode(b"$-1\r\n").unwrap();
        let empty = decode(b"$0\r\n\r\n").unwrap();
        assert_eq!(nil, Frame::Null);
        assert_eq!(empty, Frame::Bulk(Bytes::new()));
        assert_ne!(nil, empty);
    }

    #[test]
    fn round_trips_bit_for_bit() {
        round_trip(&Frame::Simple("PONG".into()));
        round_trip(&Frame::Error("WRONGTYPE bad".into()));
        round_trip(&Frame::Integer(i64::MIN));
        round_trip(&Frame::Bulk(Bytes::from_static(b"\x00\xff\r\nraw")));
        round_trip(&Frame::Null);
        round_trip(&Frame::NullArray);
        round_trip(&Frame::Array(vec![
            Frame::Bulk(Bytes::from_static(b"nested")),
            Frame::Array(vec![Frame::Null, Frame::Integer(0)]),
            Frame::NullArray,
        ]));
    }

    #[test]
    fn partial_input_is_incomplete_not_an_error() {
        for input in [
            &b"+OK"[..],
            b":12",
            b"$3\r\nba",
            b"*2\r\n$3\r\nfoo\r\n",
            b"$",
        ] {
            let mut cursor = Cursor::new(input);
            assert!(matches!(
                Frame::check(&mut cursor, MAX),
                Err(DecodeError::Incomplete)
            ));
        }
    }

    #[test]
    fn rejects_unknown_prefix() {
        let mut cursor = Cursor::new(&b"!oops\r\n"[..]);
        assert!(matches!(
            Frame::check(&mut cursor, MAX),
            Err(DecodeError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_oversized_declarations() {
        let mut cursor = Cursor::new(&b"$1048576\r\n"[..]);
        assert!(matches!(
            Frame::check(&mut cursor, MAX),
            Err(DecodeError::Invalid(_))
        ));

        let mut cursor = Cursor::new(&b"*1048576\r\n"[..]);
        assert!(matches!(
            Frame::check(&mut cursor, MAX),
            Err(DecodeError::Invalid(_))
        ));
    }
}
