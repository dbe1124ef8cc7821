//! The connection core: one client per TCP connection.
//!
//! A `Client` is a state machine around the transport. In `Normal` mode
//! every dispatch is a synchronous request/reply exchange. `open_pipeline`
//! switches to batched submission where replies are collected later, in
//! order, by `close_pipeline`. `multi`/`exec`/`discard`/`watch` drive
//! server-side transactions, including their interaction with pipelining.
//! Subscribing hands the connection to a background reader task and locks
//! the client into subscribe mode until the subscription ends.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, instrument};

use crate::clients::subscriber::SubscriptionHandle;
use crate::cmd::Command;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::value::{self, Value};
use crate::{Error, Outcome, Result};

/// Default cap on a single reply, matching the server's largest legal bulk.
pub const DEFAULT_MAX_REPLY_LEN: usize = 512 * 1024 * 1024;

/// Where to find the server and how to open the session.
///
/// `AUTH` is sent on connect when credentials are present; `SELECT` is sent
/// when the database index is non-zero. The whole endpoint (address,
/// database, credentials) keys the connection pool, so two endpoints that
/// differ only in database index never share connections.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub addr: String,
    pub database: u32,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Applies to every reply read except the subscription reader's.
    pub read_timeout: Option<Duration>,
    pub max_reply_len: usize,
}

impl Endpoint {
    pub fn new(addr: impl Into<String>) -> Endpoint {
        Endpoint {
            addr: addr.into(),
            ..Endpoint::default()
        }
    }

    pub fn database(mut self, database: u32) -> Endpoint {
        self.database = database;
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Endpoint {
        self.password = Some(password.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Endpoint {
        self.username = Some(username.into());
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Endpoint {
        self.read_timeout = Some(read_timeout);
        self
    }

    pub fn max_reply_len(mut self, max_reply_len: usize) -> Endpoint {
        self.max_reply_len = max_reply_len;
        self
    }
}

impl Default for Endpoint {
    fn default() -> Endpoint {
        Endpoint {
            addr: format!("127.0.0.1:{}", crate::DEFAULT_PORT),
            database: 0,
            username: None,
            password: None,
            read_timeout: None,
            max_reply_len: DEFAULT_MAX_REPLY_LEN,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Normal,
    Pipeline,
    Transaction,
    PipelineTransaction,
}

/// One pending pipeline read.
#[derive(Clone, Copy, Debug)]
enum Slot {
    /// Produces one positional outcome.
    Reply,
    /// Read and discarded: MULTI's `+OK`, per-command `+QUEUED` acks,
    /// DISCARD's `+OK`. Queue-time errors are discarded too; EXEC's reply is
    /// the authoritative verdict on the transaction.
    QueuedAck,
    /// EXEC's multi-bulk, expanded into one positional outcome.
    Exec,
}

/// What currently backs the client.
#[derive(Debug)]
enum Link {
    Direct(Connection),
    Subscribed(SubscriptionHandle),
    Closed,
}

/// Backed by a single `TcpStream`. Single-writer, single-reader: the pool
/// hands a client to at most one borrower at a time.
#[derive(Debug)]
pub struct Client {
    endpoint: Endpoint,
    link: Link,
    mode: Mode,
    pipeline: Vec<Slot>,
    watching: bool,
    /// The database the connection is currently SELECTed into.
    database: u32,
}

impl Client {
    /// Establishes a connection and performs the configured handshake.
    #[instrument(skip(endpoint), fields(addr = %endpoint.addr))]
    pub async fn connect(endpoint: Endpoint) -> Result<Client> {
        let stream = TcpStream::connect(&endpoint.addr).await?;
        // Small request/reply exchanges; latency beats throughput here.
        stream.set_nodelay(true)?;

        let mut connection =
            Connection::new(stream, endpoint.max_reply_len, endpoint.read_timeout);

        if let Some(password) = &endpoint.password {
            let mut auth = Command::new("AUTH");
            if let Some(username) = &endpoint.username {
                auth = auth.arg(username.as_str());
            }
            handshake(&mut connection, auth.arg(password.as_str())).await?;
        }
        if endpoint.database != 0 {
            let select = Command::new("SELECT").arg(endpoint.database);
            handshake(&mut connection, select).await?;
        }

        let database = endpoint.database;
        Ok(Client {
            endpoint,
            link: Link::Direct(connection),
            mode: Mode::Normal,
            pipeline: Vec::new(),
            watching: false,
            database,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    // ------------------------------------------------------------------
    // Dispatch discipline
    // ------------------------------------------------------------------

    /// Sends one command according to the current mode.
    ///
    /// Returns `Some(reply)` in `Normal` mode. In every queued mode the
    /// return is `None`: the real result appears in `close_pipeline` (or
    /// `exec`) and callers must not inspect the sentinel.
    pub async fn dispatch(&mut self, cmd: Command) -> Result<Option<Frame>> {
        if let Link::Subscribed(_) = self.link {
            return Err(self.subscribed_rejection(cmd.name()));
        }

        match self.mode {
            Mode::Normal => Ok(Some(self.execute(cmd).await?)),
            Mode::Pipeline => {
                self.send(cmd).await?;
                self.pipeline.push(Slot::Reply);
                Ok(None)
            }
            Mode::Transaction => {
                // The server acks queued commands immediately; the results
                // arrive as one multi-bulk from EXEC.
                let ack = self.execute(cmd).await?;
                match ack {
                    Frame::Simple(s) if s == "QUEUED" => Ok(None),
                    frame => Err(Error::protocol(format!(
                        "expected +QUEUED inside MULTI, got {frame:?}"
                    ))),
                }
            }
            Mode::PipelineTransaction => {
                self.send(cmd).await?;
                self.pipeline.push(Slot::QueuedAck);
                Ok(None)
            }
        }
    }

    /// Dispatches and converts, mapping the pipelined sentinel to the
    /// typed nil of the operation's return type.
    pub(crate) async fn dispatch_map<T, F>(&mut self, cmd: Command, convert: F) -> Result<T>
    where
        T: Default,
        F: FnOnce(Frame) -> Result<T>,
    {
        match self.dispatch(cmd).await? {
            Some(frame) => convert(frame),
            None => Ok(T::default()),
        }
    }

    /// Like `dispatch_map`, for commands that block server side. Those are
    /// rejected inside a transaction before touching the wire: the server
    /// would only queue them, turning the timeout into a deadlock trap.
    pub(crate) async fn dispatch_blocking_map<T, F>(&mut self, cmd: Command, convert: F) -> Result<T>
    where
        T: Default,
        F: FnOnce(Frame) -> Result<T>,
    {
        self.reject_in_transaction(cmd.name())?;
        self.dispatch_map(cmd, convert).await
    }

    pub(crate) fn reject_in_transaction(&self, name: &str) -> Result<()> {
        if self.in_transaction() {
            return Err(Error::InvalidState(format!(
                "{name} is not allowed inside MULTI"
            )));
        }
        Ok(())
    }

    /// One request/reply exchange. Server `-ERR` replies raise
    /// [`Error::Server`]; transport failures poison the client.
    async fn execute(&mut self, cmd: Command) -> Result<Frame> {
        debug!(command = cmd.name(), "execute");
        let connection = self.direct(cmd.name())?;
        match connection.execute(&cmd.into_frame()).await {
            Ok(Frame::Error(message)) => Err(Error::Server(message)),
            Ok(frame) => {
                debug!(reply = ?frame);
                Ok(frame)
            }
            Err(err) => Err(self.poison(err)),
        }
    }

    /// Writes without reading; the reply is owed to the pipeline buffer.
    async fn send(&mut self, cmd: Command) -> Result<()> {
        debug!(command = cmd.name(), "enqueue");
        let connection = self.direct(cmd.name())?;
        match connection.write_frame(&cmd.into_frame()).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.poison(err)),
        }
    }

    fn direct(&mut self, name: &str) -> Result<&mut Connection> {
        match &mut self.link {
            Link::Direct(connection) => Ok(connection),
            Link::Subscribed(_) => Err(Error::SubscribedMode(name.to_string())),
            Link::Closed => Err(Error::closed()),
        }
    }

    /// Fatal transport/protocol failures leave the connection unusable.
    fn poison(&mut self, err: Error) -> Error {
        if err.is_fatal() {
            self.link = Link::Closed;
            self.pipeline.clear();
        }
        err
    }

    fn subscribed_rejection(&self, name: &str) -> Error {
        match &self.link {
            Link::Subscribed(handle) if handle.is_alive() => {
                Error::SubscribedMode(name.to_string())
            }
            _ => Error::closed(),
        }
    }

    // ------------------------------------------------------------------
    // Pipelining
    // ------------------------------------------------------------------

    /// Switches to batched submission. Inside a transaction the MULTI
    /// context is preserved. Idempotent.
    pub fn open_pipeline(&mut self) -> Result<()> {
        match &self.link {
            Link::Direct(_) => {}
            Link::Subscribed(_) => return Err(self.subscribed_rejection("pipeline")),
            Link::Closed => return Err(Error::closed()),
        }
        self.mode = match self.mode {
            Mode::Normal | Mode::Pipeline => Mode::Pipeline,
            Mode::Transaction | Mode::PipelineTransaction => Mode::PipelineTransaction,
        };
        Ok(())
    }

    /// Reads every pending reply, in submission order, and leaves pipelined
    /// mode.
    ///
    /// Per-command server errors land in their positional slot; if any slot
    /// failed the whole call raises [`Error::PipelinePartial`] carrying the
    /// complete outcome list. A transport failure mid-flush poisons the
    /// client and fills the remaining slots with `ConnectionLost`.
    #[instrument(skip(self))]
    pub async fn close_pipeline(&mut self) -> Result<Vec<Value>> {
        if !matches!(self.mode, Mode::Pipeline | Mode::PipelineTransaction) {
            return Err(Error::InvalidState("no open pipeline".to_string()));
        }

        let slots = std::mem::take(&mut self.pipeline);
        let mut outcomes: Vec<Outcome> = Vec::with_capacity(slots.len());
        let mut any_failed = false;
        let mut lost = false;

        for slot in slots {
            if lost {
                if !matches!(slot, Slot::QueuedAck) {
                    outcomes.push(Err(Error::lost(std::io::Error::new(
                        std::io::ErrorKind::BrokenPipe,
                        "connection lost during pipeline flush",
                    ))));
                }
                continue;
            }

            let read = match self.direct("pipeline flush") {
                Ok(connection) => connection.read_frame().await,
                Err(err) => Err(err),
            };
            let frame = match read {
                Ok(frame) => frame,
                Err(err) => {
                    let err = self.poison(err);
                    any_failed = true;
                    lost = true;
                    if !matches!(slot, Slot::QueuedAck) {
                        outcomes.push(Err(err));
                    }
                    continue;
                }
            };

            match slot {
                Slot::QueuedAck => {}
                Slot::Reply => match frame {
                    Frame::Error(message) => {
                        any_failed = true;
                        outcomes.push(Err(Error::Server(message)));
                    }
                    frame => match Value::from_frame(frame) {
                        Ok(value) => outcomes.push(Ok(value)),
                        Err(err) => {
                            any_failed = true;
                            outcomes.push(Err(err));
                        }
                    },
                },
                Slot::Exec => {
                    let (outcome, failed) = exec_outcome(frame);
                    any_failed |= failed;
                    outcomes.push(outcome);
                }
            }
        }

        self.mode = match self.mode {
            Mode::PipelineTransaction => Mode::Transaction,
            _ => Mode::Normal,
        };

        if any_failed {
            return Err(Error::PipelinePartial(outcomes));
        }
        Ok(outcomes.into_iter().filter_map(Result::ok).collect())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Starts a transaction; every command until `exec` is queued server
    /// side. Inside a transaction this is a no-op, never an error.
    #[instrument(skip(self))]
    pub async fn multi(&mut self) -> Result<()> {
        match self.mode {
            Mode::Transaction | Mode::PipelineTransaction => Ok(()),
            Mode::Normal => {
                let reply = self.execute(Command::new("MULTI")).await?;
                value::expect_ok(reply)?;
                self.mode = Mode::Transaction;
                Ok(())
            }
            Mode::Pipeline => {
                self.send(Command::new("MULTI")).await?;
                self.pipeline.push(Slot::QueuedAck);
                self.mode = Mode::PipelineTransaction;
                Ok(())
            }
        }
    }

    /// Executes the queued transaction and returns its ordered outcomes.
    ///
    /// A transaction aborted by WATCH yields an *empty* vector and no
    /// error. If any queued command failed inside EXEC's reply, raises
    /// [`Error::PipelinePartial`] with the full outcome list. When
    /// pipelined, the result is owed to `close_pipeline` and the empty
    /// sentinel is returned.
    #[instrument(skip(self))]
    pub async fn exec(&mut self) -> Result<Vec<Value>> {
        match self.mode {
            Mode::Normal | Mode::Pipeline => {
                Err(Error::InvalidState("EXEC without MULTI".to_string()))
            }
            Mode::Transaction => {
                let reply = self.execute(Command::new("EXEC")).await;
                // Server side the transaction is over either way.
                self.mode = Mode::Normal;
                self.watching = false;

                match exec_outcome(reply?) {
                    (Ok(Value::Array(values)), _) => Ok(values),
                    (Ok(value), _) => Err(Error::protocol(format!(
                        "expected a multi-bulk from EXEC, got {value:?}"
                    ))),
                    (Err(err), _) => Err(err),
                }
            }
            Mode::PipelineTransaction => {
                self.send(Command::new("EXEC")).await?;
                self.pipeline.push(Slot::Exec);
                self.mode = Mode::Pipeline;
                self.watching = false;
                Ok(Vec::new())
            }
        }
    }

    /// Abandons the queued transaction.
    #[instrument(skip(self))]
    pub async fn discard(&mut self) -> Result<()> {
        match self.mode {
            Mode::Normal | Mode::Pipeline => {
                Err(Error::InvalidState("DISCARD without MULTI".to_string()))
            }
            Mode::Transaction => {
                let reply = self.execute(Command::new("DISCARD")).await;
                self.mode = Mode::Normal;
                self.watching = false;
                value::expect_ok(reply?)
            }
            Mode::PipelineTransaction => {
                self.send(Command::new("DISCARD")).await?;
                self.pipeline.push(Slot::QueuedAck);
                self.mode = Mode::Pipeline;
                self.watching = false;
                Ok(())
            }
        }
    }

    /// Marks keys for optimistic locking: if any changes before `exec`, the
    /// transaction aborts. Only legal before MULTI.
    #[instrument(skip(self))]
    pub async fn watch(&mut self, keys: &[&str]) -> Result<()> {
        self.reject_in_transaction("WATCH")?;
        self.dispatch_map(Command::new("WATCH").args(keys), value::expect_ok)
            .await?;
        self.watching = true;
        Ok(())
    }

    /// Clears every watch on this connection.
    pub async fn unwatch(&mut self) -> Result<()> {
        self.reject_in_transaction("UNWATCH")?;
        self.dispatch_map(Command::new("UNWATCH"), value::expect_ok)
            .await?;
        self.watching = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle and state
    // ------------------------------------------------------------------

    /// Closes the connection. Idempotent; any later command raises
    /// [`Error::ConnectionLost`]. A live subscription is shut down and its
    /// reader awaited, so the listener sees no messages after this returns.
    #[instrument(skip(self))]
    pub async fn close(&mut self) {
        match std::mem::replace(&mut self.link, Link::Closed) {
            Link::Direct(mut connection) => connection.close().await,
            Link::Subscribed(handle) => handle.close().await,
            Link::Closed => {}
        }
        self.pipeline.clear();
    }

    pub fn is_closed(&self) -> bool {
        match &self.link {
            Link::Closed => true,
            Link::Subscribed(handle) => !handle.is_alive(),
            Link::Direct(_) => false,
        }
    }

    pub fn is_pipelined(&self) -> bool {
        matches!(self.mode, Mode::Pipeline | Mode::PipelineTransaction)
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.mode, Mode::Transaction | Mode::PipelineTransaction)
    }

    pub fn is_subscribed(&self) -> bool {
        matches!(&self.link, Link::Subscribed(handle) if handle.is_alive())
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// Whether the pool may put this client back on the idle stack: normal
    /// mode, no watches, no subscription, not closed, and still on the
    /// database it was leased for.
    pub(crate) fn is_poolable(&self) -> bool {
        matches!(self.link, Link::Direct(_))
            && self.mode == Mode::Normal
            && !self.watching
            && self.database == self.endpoint.database
    }

    pub(crate) fn note_selected(&mut self, database: u32) {
        self.database = database;
    }

    pub(crate) fn subscription_handle(&self) -> Option<&SubscriptionHandle> {
        match &self.link {
            Link::Subscribed(handle) => Some(handle),
            _ => None,
        }
    }

    /// Hands the connection to the subscription reader.
    pub(crate) fn take_connection_for_subscription(&mut self) -> Result<Connection> {
        if self.mode != Mode::Normal {
            return Err(Error::Unsupported(
                "subscribing requires an idle connection".to_string(),
            ));
        }
        match std::mem::replace(&mut self.link, Link::Closed) {
            Link::Direct(connection) => Ok(connection),
            Link::Closed => Err(Error::closed()),
            Link::Subscribed(handle) => {
                if handle.is_alive() {
                    self.link = Link::Subscribed(handle);
                    Err(Error::SubscribedMode("SUBSCRIBE".to_string()))
                } else {
                    Err(Error::closed())
                }
            }
        }
    }

    pub(crate) fn install_subscription(&mut self, handle: SubscriptionHandle) {
        self.link = Link::Subscribed(handle);
    }
}

/// Converts EXEC's reply into one positional outcome plus a failure flag.
///
/// Nil multi-bulk is the WATCH abort: an empty result set, not an error.
fn exec_outcome(frame: Frame) -> (Outcome, bool) {
    match frame {
        Frame::NullArray => (Ok(Value::Array(Vec::new())), false),
        Frame::Array(items) => {
            let mut failed = false;
            let mut outcomes: Vec<Outcome> = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Frame::Error(message) => {
                        failed = true;
                        outcomes.push(Err(Error::Server(message)));
                    }
                    frame => match Value::from_frame(frame) {
                        Ok(value) => outcomes.push(Ok(value)),
                        Err(err) => {
                            failed = true;
                            outcomes.push(Err(err));
                        }
                    },
                }
            }
            if failed {
                (Err(Error::PipelinePartial(outcomes)), true)
            } else {
                let values = outcomes.into_iter().filter_map(Result::ok).collect();
                (Ok(Value::Array(values)), false)
            }
        }
        // EXECABORT and friends.
        Frame::Error(message) => (Err(Error::Server(message)), true),
        frame => (
            Err(Error::protocol(format!(
                "expected a multi-bulk from EXEC, got {frame:?}"
            ))),
            true,
        ),
    }
}

async fn handshake(connection: &mut Connection, cmd: Command) -> Result<()> {
    match connection.execute(&cmd.into_frame()).await? {
        Frame::Error(message) => Err(Error::Server(message)),
        Frame::Simple(s) if s == "OK" => Ok(()),
        frame => Err(Error::protocol(format!(
            "unexpected handshake reply {frame:?}"
        ))),
    }
}
