//! Building commands for the wire.
//!
//! A [`Command`] is an operation name plus an ordered sequence of opaque
//! byte-string arguments; on the wire it becomes an array of bulk strings.
//! The typed operation surface assembles one of these per call, so a single
//! builder covers the whole command set.

use bytes::Bytes;

use crate::frame::{Frame, PushFrame};

/// One request: immutable once dispatched.
#[derive(Debug)]
pub struct Command {
    name: &'static str,
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: &'static str) -> Command {
        Command {
            name,
            args: Vec::new(),
        }
    }

    /// Appends one argument; accepts anything convertible to wire bytes.
    pub fn arg(mut self, arg: impl ToArg) -> Command {
        self.args.push(arg.to_arg());
        self
    }

    /// Appends every item of a slice.
    pub fn args<A: ToArg>(mut self, args: &[A]) -> Command {
        for arg in args {
            self.args.push(arg.to_arg());
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn into_frame(self) -> Frame {
        let mut frame = Vec::with_capacity(self.args.len() + 1);
        frame.push_bulk(Bytes::from(self.name.as_bytes()));
        for arg in self.args {
            frame.push_bulk(arg);
        }

        frame.into()
    }
}

/// Conversion of one command argument into its wire bytes.
pub trait ToArg {
    fn to_arg(&self) -> Bytes;
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl ToArg for &str {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for &[u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for i64 {
    fn to_arg(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl ToArg for u64 {
    fn to_arg(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl ToArg for u32 {
    fn to_arg(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl ToArg for usize {
    fn to_arg(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl ToArg for f64 {
    /// Scores and range bounds; infinities use the server's spelling.
    fn to_arg(&self) -> Bytes {
        if *self == f64::INFINITY {
            Bytes::from_static(b"+inf")
        } else if *self == f64::NEG_INFINITY {
            Bytes::from_static(b"-inf")
        } else {
            Bytes::from(self.to_string())
        }
    }
}
