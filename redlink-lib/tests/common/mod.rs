//! A scripted in-process server for driving the client end to end.
//!
//! Each accepted connection runs a handler: for every decoded command the
//! handler returns the raw bytes to write back (possibly several frames,
//! possibly none). When the scripted command count is exhausted the connection is
//! dropped, which doubles as the "server went away" fixture.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use redlink_lib::Endpoint;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// `(command index, decoded args) -> response bytes`.
pub type Handler = fn(usize, &[Vec<u8>]) -> Vec<u8>;

pub struct MockServer {
    pub addr: String,
    accepted: Arc<AtomicUsize>,
}

impl MockServer {
    pub fn endpoint(&self) -> Endpoint {
        // A short read timeout keeps a broken expectation from hanging the
        // whole test run.
        Endpoint::new(self.addr.clone()).read_timeout(Duration::from_secs(5))
    }

    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

/// One connection serving `expected` commands, then held open until the
/// client goes away.
pub async fn spawn(expected: usize, handler: Handler) -> MockServer {
    spawn_conns(vec![(expected, handler)]).await
}

/// One connection that is dropped as soon as its scripted commands are served; the
/// fixture for a server that goes away mid-conversation.
pub async fn spawn_drop(expected: usize, handler: Handler) -> MockServer {
    spawn_inner(vec![(expected, handler)], false).await
}

/// Serves each accepted connection with the next `(expected, handler)`
/// pair, in accept order.
pub async fn spawn_conns(conns: Vec<(usize, Handler)>) -> MockServer {
    spawn_inner(conns, true).await
}

async fn spawn_inner(conns: Vec<(usize, Handler)>, hold_open: bool) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        for (expected, handler) in conns {
            let (mut stream, _) = listener.accept().await.expect("accept");
            counter.fetch_add(1, Ordering::SeqCst);
            if hold_open {
                tokio::spawn(async move {
                    serve(&mut stream, expected, handler).await;
                    drain(&mut stream).await;
                });
            } else {
                serve(&mut stream, expected, handler).await;
            }
        }
    });

    MockServer { addr, accepted }
}

async fn serve(stream: &mut TcpStream, expected: usize, handler: Handler) {
    for idx in 0..expected {
        let args = match read_command(stream).await {
            Ok(args) => args,
            Err(err) => panic!("mock server failed reading command {idx}: {err}"),
        };
        let response = handler(idx, &args);
        if !response.is_empty() {
            stream.write_all(&response).await.expect("write response");
            stream.flush().await.expect("flush response");
        }
    }
    // Dropping the stream closes the connection.
}

/// Keeps the connection open, discarding anything else the client sends,
/// until the client closes it.
async fn drain(stream: &mut TcpStream) {
    let mut sink = [0u8; 512];
    loop {
        match stream.read(&mut sink).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

async fn read_command(stream: &mut TcpStream) -> std::io::Result<Vec<Vec<u8>>> {
    let header = read_line(stream).await?;
    assert_eq!(header.first(), Some(&b'*'), "expected an array header");
    let count = parse_usize(&header[1..]);

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len_line = read_line(stream).await?;
        assert_eq!(len_line.first(), Some(&b'$'), "expected a bulk header");
        let len = parse_usize(&len_line[1..]);

        let mut data = vec![0u8; len + 2];
        stream.read_exact(&mut data).await?;
        assert_eq!(&data[len..], b"\r\n", "bulk payload missing CRLF");
        data.truncate(len);
        args.push(data);
    }
    Ok(args)
}

async fn read_line(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut line = Vec::new();
    loop {
        let byte = stream.read_u8().await?;
        if byte == b'\n' {
            break;
        }
        line.push(byte);
    }
    assert_eq!(line.last(), Some(&b'\r'), "line missing CR");
    line.pop();
    Ok(line)
}

fn parse_usize(digits: &[u8]) -> usize {
    std::str::from_utf8(digits)
        .expect("decimal digits")
        .parse()
        .expect("decimal length")
}

// ---------------------------------------------------------------------
// Reply builders
// ---------------------------------------------------------------------

pub fn simple(text: &str) -> Vec<u8> {
    format!("+{text}\r\n").into_bytes()
}

pub fn ok() -> Vec<u8> {
    simple("OK")
}

pub fn queued() -> Vec<u8> {
    simple("QUEUED")
}

pub fn server_error(text: &str) -> Vec<u8> {
    format!("-{text}\r\n").into_bytes()
}

pub fn integer(value: i64) -> Vec<u8> {
    format!(":{value}\r\n").into_bytes()
}

pub fn bulk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

pub fn nil() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

pub fn nil_array() -> Vec<u8> {
    b"*-1\r\n".to_vec()
}

/// An array frame from already-encoded element frames.
pub fn array(elements: &[Vec<u8>]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", elements.len()).into_bytes();
    for element in elements {
        out.extend_from_slice(element);
    }
    out
}

/// Several frames back to back in one response.
pub fn concat(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for frame in frames {
        out.extend_from_slice(frame);
    }
    out
}

/// A `subscribe`/`unsubscribe`-family acknowledgement frame.
pub fn sub_ack(kind: &str, name: &str, remaining: i64) -> Vec<u8> {
    array(&[bulk(kind.as_bytes()), bulk(name.as_bytes()), integer(remaining)])
}

/// A pushed pub/sub message frame.
pub fn push_message(channel: &str, payload: &[u8]) -> Vec<u8> {
    array(&[bulk(b"message"), bulk(channel.as_bytes()), bulk(payload)])
}
