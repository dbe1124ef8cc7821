//! Typed views over reply frames.
//!
//! [`Value`] is the generic outcome used wherever a batch mixes reply shapes
//! (pipeline flushes, `EXEC` results, scripting). The `expect_*` functions
//! are the per-operation conversions: each operation declares its expected
//! reply shape by picking one, and any mismatch is a protocol error.

use std::str;

use bytes::Bytes;

use crate::frame::Frame;
use crate::{Error, Result};

/// A decoded reply with no command-specific shape attached.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    /// The nil bulk string.
    #[default]
    Nil,
    Int(i64),
    Bytes(Bytes),
    /// A simple-string reply, e.g. `OK`.
    Status(String),
    Array(Vec<Value>),
}

impl Value {
    /// Converts a non-error reply frame. `Error` frames become
    /// [`Error::Server`].
    pub fn from_frame(frame: Frame) -> Result<Value> {
        match frame {
            Frame::Simple(s) => Ok(Value::Status(s)),
            Frame::Error(msg) => Err(Error::Server(msg)),
            Frame::Integer(n) => Ok(Value::Int(n)),
            Frame::Bulk(data) => Ok(Value::Bytes(data)),
            Frame::Null => Ok(Value::Nil),
            Frame::Array(items) => {
                let items: Vec<Value> = items
                    .into_iter()
                    .map(Value::from_frame)
                    .collect::<Result<_>>()?;
                Ok(Value::Array(items))
            }
            // An aborted transaction; represented as "no results".
            Frame::NullArray => Ok(Value::Array(Vec::new())),
        }
    }
}

fn unexpected<T>(what: &str, frame: &Frame) -> Result<T> {
    Err(Error::protocol(format!("expected {what}, got {frame:?}")))
}

/// `+OK` acknowledgements.
pub(crate) fn expect_ok(frame: Frame) -> Result<()> {
    match frame {
        Frame::Simple(s) if s == "OK" => Ok(()),
        frame => unexpected("+OK", &frame),
    }
}

pub(crate) fn expect_int(frame: Frame) -> Result<i64> {
    match frame {
        Frame::Integer(n) => Ok(n),
        frame => unexpected("an integer reply", &frame),
    }
}

/// Boolean commands reply `:0`/`:1`, a few with `+OK`.
pub(crate) fn expect_bool(frame: Frame) -> Result<bool> {
    match frame {
        Frame::Integer(0) => Ok(false),
        Frame::Integer(1) => Ok(true),
        Frame::Simple(s) if s == "OK" => Ok(true),
        frame => unexpected("a boolean reply", &frame),
    }
}

/// A bulk reply where nil means absent. Nil is never the empty string.
pub(crate) fn expect_bytes(frame: Frame) -> Result<Option<Bytes>> {
    match frame {
        Frame::Bulk(data) => Ok(Some(data)),
        Frame::Simple(s) => Ok(Some(Bytes::from(s.into_bytes()))),
        Frame::Null | Frame::NullArray => Ok(None),
        frame => unexpected("a bulk reply", &frame),
    }
}

/// A bulk reply that is never nil (ranges of strings, dumps of text).
pub(crate) fn expect_data(frame: Frame) -> Result<Bytes> {
    match frame {
        Frame::Bulk(data) => Ok(data),
        Frame::Simple(s) => Ok(Bytes::from(s.into_bytes())),
        frame => unexpected("a bulk reply", &frame),
    }
}

pub(crate) fn expect_string(frame: Frame) -> Result<String> {
    match frame {
        Frame::Simple(s) => Ok(s),
        Frame::Bulk(data) => str::from_utf8(&data)
            .map(str::to_string)
            .map_err(|_| Error::protocol("bulk reply is not valid utf-8")),
        frame => unexpected("a textual reply", &frame),
    }
}

/// Floating-point replies arrive as bulk decimal text.
pub(crate) fn expect_float(frame: Frame) -> Result<f64> {
    match frame {
        Frame::Bulk(data) => parse_float(&data),
        Frame::Simple(s) => parse_float(s.as_bytes()),
        frame => unexpected("a bulk float reply", &frame),
    }
}

pub(crate) fn expect_opt_float(frame: Frame) -> Result<Option<f64>> {
    match frame {
        Frame::Null => Ok(None),
        frame => expect_float(frame).map(Some),
    }
}

/// Integer-or-nil replies (ranks).
pub(crate) fn expect_opt_int(frame: Frame) -> Result<Option<i64>> {
    match frame {
        Frame::Null | Frame::NullArray => Ok(None),
        Frame::Integer(n) => Ok(Some(n)),
        frame => unexpected("an integer or nil reply", &frame),
    }
}

/// A multi-bulk of non-nil bulks (KEYS, SMEMBERS, LRANGE, ...).
pub(crate) fn expect_bytes_vec(frame: Frame) -> Result<Vec<Bytes>> {
    match frame {
        Frame::Array(items) => items.into_iter().map(expect_data).collect(),
        Frame::NullArray => Ok(Vec::new()),
        frame => unexpected("a multi-bulk reply", &frame),
    }
}

/// A multi-bulk whose elements may individually be nil (MGET, HMGET, SORT
/// with missing GET targets).
pub(crate) fn expect_opt_bytes_vec(frame: Frame) -> Result<Vec<Option<Bytes>>> {
    match frame {
        Frame::Array(items) => items.into_iter().map(expect_bytes).collect(),
        Frame::NullArray => Ok(Vec::new()),
        frame => unexpected("a multi-bulk reply", &frame),
    }
}

/// A flat multi-bulk of alternating field/value entries (HGETALL).
pub(crate) fn expect_pairs(frame: Frame) -> Result<Vec<(Bytes, Bytes)>> {
    let flat = expect_bytes_vec(frame)?;
    if flat.len() % 2 != 0 {
        return Err(Error::protocol("field/value reply has an odd element count"));
    }
    let mut pairs = Vec::with_capacity(flat.len() / 2);
    let mut entries = flat.into_iter();
    while let (Some(field), Some(value)) = (entries.next(), entries.next()) {
        pairs.push((field, value));
    }
    Ok(pairs)
}

/// Textual field/value pairs (CONFIG GET).
pub(crate) fn expect_string_pairs(frame: Frame) -> Result<Vec<(String, String)>> {
    expect_pairs(frame)?
        .into_iter()
        .map(|(field, value)| {
            let field = str::from_utf8(&field)
                .map_err(|_| Error::protocol("config key is not valid utf-8"))?
                .to_string();
            let value = str::from_utf8(&value)
                .map_err(|_| Error::protocol("config value is not valid utf-8"))?
                .to_string();
            Ok((field, value))
        })
        .collect()
}

/// A flat multi-bulk of alternating member/score entries (WITHSCORES).
pub(crate) fn expect_scored(frame: Frame) -> Result<Vec<(Bytes, f64)>> {
    let flat = expect_bytes_vec(frame)?;
    if flat.len() % 2 != 0 {
        return Err(Error::protocol("member/score reply has an odd element count"));
    }
    let mut scored = Vec::with_capacity(flat.len() / 2);
    let mut entries = flat.into_iter();
    while let (Some(member), Some(score)) = (entries.next(), entries.next()) {
        scored.push((member, parse_float(&score)?));
    }
    Ok(scored)
}

/// The `[key, element]` reply of a blocking pop; nil array on timeout.
pub(crate) fn expect_keyed_pop(frame: Frame) -> Result<Option<(String, Bytes)>> {
    match frame {
        Frame::NullArray | Frame::Null => Ok(None),
        Frame::Array(items) if items.len() == 2 => {
            let mut items = items.into_iter();
            let (Some(key), Some(value)) = (items.next(), items.next()) else {
                return Err(Error::protocol("malformed pop reply"));
            };
            Ok(Some((expect_string(key)?, expect_data(value)?)))
        }
        frame => unexpected("a two-element pop reply", &frame),
    }
}

/// `SCRIPT EXISTS` replies one integer flag per queried digest.
pub(crate) fn expect_bool_vec(frame: Frame) -> Result<Vec<bool>> {
    match frame {
        Frame::Array(items) => items.into_iter().map(expect_bool).collect(),
        frame => unexpected("a multi-bulk of flags", &frame),
    }
}

fn parse_float(data: &[u8]) -> Result<f64> {
    str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .ok_or_else(|| Error::protocol("reply is not a decimal float"))
}
