//! The transport: one TCP connection carrying frames in both directions.
//!
//! `read_buf` is filled until it holds at least one complete frame; the
//! parsed frame is returned and any surplus bytes stay buffered for the next
//! call. `read_frame` is cancellation safe for the same reason: dropping the
//! future mid-read leaves the partial frame in the buffer.

use std::io::Cursor;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::time;

use crate::frame::{DecodeError, Frame};
use crate::{Error, Result};

const BUF_SIZE: usize = 4 * 1024;

/// Reads and writes `Frame` values on the underlying `TcpStream`.
///
/// Not thread safe; one task drives it at a time. Replies come back in
/// submission order, so `write_frame` N times followed by `read_frame` N
/// times is a valid pipelined exchange.
#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    read_buf: BytesMut,
    write_buf: Vec<u8>,
    /// Declared reply lengths above this are protocol errors.
    max_reply_len: usize,
    read_timeout: Option<Duration>,
}

impl Connection {
    pub(crate) fn new(
        stream: TcpStream,
        max_reply_len: usize,
        read_timeout: Option<Duration>,
    ) -> Connection {
        Connection {
            stream: BufWriter::new(stream),
            read_buf: BytesMut::with_capacity(BUF_SIZE),
            write_buf: Vec::with_capacity(BUF_SIZE),
            max_reply_len,
            read_timeout,
        }
    }

    /// The subscription reader parks in a read indefinitely; it clears the
    /// timeout for the lifetime of the subscription.
    pub(crate) fn set_read_timeout(&mut self, read_timeout: Option<Duration>) {
        self.read_timeout = read_timeout;
    }

    /// Reads exactly one reply, waiting if necessary.
    ///
    /// EOF, socket failure, and an elapsed read timeout all surface as
    /// [`Error::ConnectionLost`]; a framing violation is [`Error::Protocol`].
    pub(crate) async fn read_frame(&mut self) -> Result<Frame> {
        match self.read_timeout {
            Some(limit) => match time::timeout(limit, self.read_frame_inner()).await {
                Ok(result) => result,
                Err(_) => Err(Error::lost(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "read timed out",
                ))),
            },
            None => self.read_frame_inner().await,
        }
    }

    async fn read_frame_inner(&mut self) -> Result<Frame> {
        loop {
            // Attempt to parse a frame from the buffered data. If enough data
            // has been buffered, the frame is returned.
            if let Some(frame) = self.parse_frame()? {
                return Ok(frame);
            }

            // Not enough buffered data; pull more from the socket. `0`
            // indicates end of stream, which mid-protocol means the server
            // went away.
            if 0 == self.stream.read_buf(&mut self.read_buf).await? {
                return Err(Error::reset());
            }
        }
    }

    /// Tries to decode one frame from the buffer, consuming its bytes only
    /// when the frame is complete.
    fn parse_frame(&mut self) -> Result<Option<Frame>> {
        let mut buf = Cursor::new(&self.read_buf[..]);

        // Scanning first is cheaper than parsing and lets us leave the
        // buffer untouched until a whole frame has arrived.
        match Frame::check(&mut buf, self.max_reply_len) {
            Ok(()) => {
                let len = buf.position() as usize;
                buf.set_position(0);
                let frame = Frame::parse(&mut buf)?;
                self.read_buf.advance(len);

                Ok(Some(frame))
            }
            Err(DecodeError::Incomplete) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes a single frame and flushes, so the command is on the wire when
    /// this returns. Pipelining is therefore a property of *when replies are
    /// read*, not of deferred writes.
    pub(crate) async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_buf.clear();
        frame.write_to(&mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Sends one command frame and reads exactly one reply.
    pub(crate) async fn execute(&mut self, frame: &Frame) -> Result<Frame> {
        self.write_frame(frame).await?;
        self.read_frame().await
    }

    /// Best-effort flush and TCP shutdown. Idempotent; errors are ignored
    /// since the connection is done either way.
    pub(crate) async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
