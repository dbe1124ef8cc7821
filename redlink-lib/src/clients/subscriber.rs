//! The subscription machine.
//!
//! Once a client subscribes, its connection turns into a unidirectional
//! push channel: a dedicated reader task owns the connection and routes
//! every incoming frame. Control commands (further subscribes and
//! unsubscribes) travel over an mpsc channel into the same task, which
//! writes them between reads, so reads and writes never interleave
//! mid-frame and the reader holds no lock while blocked.
//!
//! The server acknowledges every (un)subscribe with a frame carrying the
//! remaining subscription count; the reader, not the caller, consumes those
//! acks and maintains the channel/pattern sets. When the count reaches
//! zero the task exits and closes the connection: a connection that has
//! been in subscribe mode may still hold buffered push frames and is never
//! reused.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cmd::Command;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::{Error, Result};

/// A message pushed to a subscribed connection.
///
/// `pattern` is set when the message was matched by a pattern
/// subscription; `channel` is always the channel the message was published
/// to.
#[derive(Clone, Debug)]
pub struct Message {
    pub pattern: Option<String>,
    pub channel: String,
    pub payload: Bytes,
}

/// Receives every message pushed to one subscription, on the reader task.
pub trait MessageListener: Send + 'static {
    fn on_message(&mut self, message: Message);
}

impl<F> MessageListener for F
where
    F: FnMut(Message) + Send + 'static,
{
    fn on_message(&mut self, message: Message) {
        self(message);
    }
}

/// A listener that forwards into an unbounded queue, for pull-style
/// consumers and the stream façade.
pub struct QueueListener(mpsc::UnboundedSender<Message>);

impl QueueListener {
    pub fn new() -> (QueueListener, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (QueueListener(tx), rx)
    }
}

impl MessageListener for QueueListener {
    fn on_message(&mut self, message: Message) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.0.send(message);
    }
}

pub(crate) enum Control {
    Send(Frame),
    Shutdown,
}

#[derive(Default, Debug)]
struct Registry {
    channels: HashSet<String>,
    patterns: HashSet<String>,
}

#[derive(Debug)]
struct Shared {
    alive: AtomicBool,
    registry: Mutex<Registry>,
}

/// Control handle over a live subscription. Cloneable; every clone talks to
/// the same reader task.
#[derive(Clone, Debug)]
pub struct Subscription {
    control: mpsc::UnboundedSender<Control>,
    shared: Arc<Shared>,
}

impl Subscription {
    /// Adds channels to the subscription. The acknowledgement is consumed
    /// by the reader; this returns as soon as the command is handed over.
    pub fn subscribe(&self, channels: &[&str]) -> Result<()> {
        self.send_control(Command::new("SUBSCRIBE").args(channels))
    }

    /// Adds pattern subscriptions.
    pub fn psubscribe(&self, patterns: &[&str]) -> Result<()> {
        self.send_control(Command::new("PSUBSCRIBE").args(patterns))
    }

    /// Removes channels; with an empty list, all of them.
    pub fn unsubscribe(&self, channels: &[&str]) -> Result<()> {
        self.send_control(Command::new("UNSUBSCRIBE").args(channels))
    }

    /// Removes pattern subscriptions; with an empty list, all of them.
    pub fn punsubscribe(&self, patterns: &[&str]) -> Result<()> {
        self.send_control(Command::new("PUNSUBSCRIBE").args(patterns))
    }

    /// False once fully unsubscribed or the connection is gone.
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// The channels currently subscribed, as acknowledged by the server.
    pub fn channels(&self) -> Vec<String> {
        let registry = self.shared.registry.lock().expect("subscription registry poisoned");
        registry.channels.iter().cloned().collect()
    }

    /// The patterns currently subscribed, as acknowledged by the server.
    pub fn patterns(&self) -> Vec<String> {
        let registry = self.shared.registry.lock().expect("subscription registry poisoned");
        registry.patterns.iter().cloned().collect()
    }

    fn send_control(&self, cmd: Command) -> Result<()> {
        if !self.is_alive() {
            return Err(Error::closed());
        }
        self.control
            .send(Control::Send(cmd.into_frame()))
            .map_err(|_| Error::closed())
    }
}

/// Owned by the `Client` while in subscribe mode.
#[derive(Debug)]
pub(crate) struct SubscriptionHandle {
    control: mpsc::UnboundedSender<Control>,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub(crate) fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    pub(crate) fn subscription(&self) -> Subscription {
        Subscription {
            control: self.control.clone(),
            shared: self.shared.clone(),
        }
    }

    /// Hard close: stops the reader and waits for it to release the
    /// connection.
    pub(crate) async fn close(self) {
        let _ = self.control.send(Control::Shutdown);
        let _ = self.task.await;
    }
}

/// Spawns the reader task over a connection whose initial SUBSCRIBE has
/// already been written.
pub(crate) fn spawn(connection: Connection, listener: Box<dyn MessageListener>) -> SubscriptionHandle {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        alive: AtomicBool::new(true),
        registry: Mutex::new(Registry::default()),
    });

    let task = tokio::spawn(run(connection, listener, control_rx, shared.clone()));

    SubscriptionHandle {
        control: control_tx,
        shared,
        task,
    }
}

enum Step {
    Continue,
    Done,
}

async fn run(
    mut connection: Connection,
    mut listener: Box<dyn MessageListener>,
    mut control: mpsc::UnboundedReceiver<Control>,
    shared: Arc<Shared>,
) {
    loop {
        tokio::select! {
            read = connection.read_frame() => match read {
                Ok(frame) => match route(frame, listener.as_mut(), &shared) {
                    Ok(Step::Continue) => {}
                    Ok(Step::Done) => break,
                    Err(err) => {
                        warn!(%err, "subscription reader stopped");
                        break;
                    }
                },
                // Connection loss, including a deliberate socket shutdown,
                // terminates the subscription.
                Err(err) => {
                    debug!(%err, "subscription reader stopped");
                    break;
                }
            },
            ctl = control.recv() => match ctl {
                Some(Control::Send(frame)) => {
                    if connection.write_frame(&frame).await.is_err() {
                        break;
                    }
                }
                // Shutdown, or every handle was dropped.
                Some(Control::Shutdown) | None => break,
            },
        }
    }

    shared.alive.store(false, Ordering::Release);
    connection.close().await;
}

/// Routes one push frame: messages to the listener, acks to bookkeeping.
fn route(frame: Frame, listener: &mut dyn MessageListener, shared: &Shared) -> Result<Step> {
    let Frame::Array(items) = frame else {
        return Err(Error::protocol("subscription push is not a multi-bulk"));
    };
    let mut items = items.into_iter();
    let kind = match items.next() {
        Some(frame) => crate::value::expect_string(frame)?,
        None => return Err(Error::protocol("empty subscription push")),
    };

    match kind.as_str() {
        "message" => {
            let (Some(channel), Some(payload)) = (items.next(), items.next()) else {
                return Err(Error::protocol("malformed message push"));
            };
            listener.on_message(Message {
                pattern: None,
                channel: crate::value::expect_string(channel)?,
                payload: crate::value::expect_data(payload)?,
            });
            Ok(Step::Continue)
        }
        "pmessage" => {
            let (Some(pattern), Some(channel), Some(payload)) =
                (items.next(), items.next(), items.next())
            else {
                return Err(Error::protocol("malformed pmessage push"));
            };
            listener.on_message(Message {
                pattern: Some(crate::value::expect_string(pattern)?),
                channel: crate::value::expect_string(channel)?,
                payload: crate::value::expect_data(payload)?,
            });
            Ok(Step::Continue)
        }
        "subscribe" | "psubscribe" | "unsubscribe" | "punsubscribe" => {
            let (Some(name), Some(remaining)) = (items.next(), items.next()) else {
                return Err(Error::protocol("malformed subscription ack"));
            };
            let name = crate::value::expect_string(name)?;
            let remaining = crate::value::expect_int(remaining)?;
            debug!(kind = %kind, name = %name, remaining, "subscription ack");

            {
                let mut registry = shared.registry.lock().expect("subscription registry poisoned");
                match kind.as_str() {
                    "subscribe" => {
                        registry.channels.insert(name);
                    }
                    "psubscribe" => {
                        registry.patterns.insert(name);
                    }
                    "unsubscribe" => {
                        registry.channels.remove(&name);
                    }
                    _ => {
                        registry.patterns.remove(&name);
                    }
                }
            }

            // The server reports how many subscriptions remain on this
            // connection; zero after an unsubscribe ends the subscription.
            if remaining == 0 && matches!(kind.as_str(), "unsubscribe" | "punsubscribe") {
                return Ok(Step::Done);
            }
            Ok(Step::Continue)
        }
        other => Err(Error::protocol(format!(
            "unexpected subscription push kind `{other}`"
        ))),
    }
}
