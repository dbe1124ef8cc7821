//! The error taxonomy shared by every layer of the client.
//!
//! Transport and codec conditions are mapped into these variants exactly
//! once, at the layer that observes them; everything above matches on the
//! variant rather than on driver-specific causes.

use std::io;
use std::sync::Arc;

use crate::value::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// One positional slot of a flushed pipeline or of an `EXEC` reply.
pub type Outcome = Result<Value>;

#[derive(Debug, Error)]
pub enum Error {
    /// The TCP connection failed, timed out, or was closed underneath us.
    ///
    /// Once a connection has raised this, it is terminal: every further
    /// operation on the same client raises it again.
    #[error("connection lost")]
    ConnectionLost(#[source] Arc<io::Error>),

    /// The peer violated the wire protocol (bad prefix, bad length,
    /// truncated frame, or a reply shape the operation did not expect).
    #[error("protocol error; {0}")]
    Protocol(String),

    /// The server answered with an error reply; carries the server's
    /// message verbatim.
    #[error("server error; {0}")]
    Server(String),

    /// One or more commands of a flushed pipeline (or of an `EXEC` batch)
    /// failed. Carries the complete ordered outcome list, successes and
    /// failures both, positionally aligned with submission order.
    #[error("pipeline flushed with command failures")]
    PipelinePartial(Vec<Outcome>),

    /// A non-subscription command was attempted while the connection is in
    /// subscribe mode; carries the rejected command name.
    #[error("connection is in subscribe mode; cannot execute {0}")]
    SubscribedMode(String),

    /// The requested transition is not legal in the current mode, e.g.
    /// WATCH after MULTI or a blocking command inside a transaction.
    #[error("invalid state; {0}")]
    InvalidState(String),

    /// The operation cannot be performed in the current mode at all.
    #[error("unsupported; {0}")]
    Unsupported(String),

    /// The pool is at capacity (or drained) and no connection became
    /// available within the configured wait.
    #[error("connection pool exhausted")]
    PoolExhausted,
}

impl Error {
    pub(crate) fn lost(err: io::Error) -> Error {
        Error::ConnectionLost(Arc::new(err))
    }

    /// The peer closed the stream while a reply was outstanding.
    pub(crate) fn reset() -> Error {
        Error::lost(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by server",
        ))
    }

    /// The client itself has already been closed.
    pub(crate) fn closed() -> Error {
        Error::lost(io::Error::new(
            io::ErrorKind::NotConnected,
            "connection has been closed",
        ))
    }

    pub(crate) fn protocol(detail: impl Into<String>) -> Error {
        Error::Protocol(detail.into())
    }

    /// Whether this error leaves the connection unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ConnectionLost(_) | Error::Protocol(_))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::lost(err)
    }
}
