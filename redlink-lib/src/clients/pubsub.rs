//! Publishing, and the entry points into subscribe mode.

use bytes::Bytes;
use tokio_stream::Stream;
use tracing::instrument;

use crate::clients::subscriber::{self, MessageListener, QueueListener, Subscription};
use crate::clients::{Client, Message};
use crate::cmd::Command;
use crate::value::expect_int;
use crate::{Error, Result};

impl Client {
    /// Publish `message` to `channel`, returning the number of receiving
    /// subscribers.
    pub async fn publish(&mut self, channel: &str, message: Bytes) -> Result<i64> {
        self.dispatch_map(
            Command::new("PUBLISH").arg(channel).arg(message),
            expect_int,
        )
        .await
    }

    /// Subscribe to channels, turning this connection into a push channel.
    ///
    /// The connection moves to a dedicated reader task that feeds
    /// `listener`; from here on, only subscription control (through the
    /// returned [`Subscription`]) and `close` are accepted; anything else
    /// raises [`Error::SubscribedMode`]. When the last channel and pattern
    /// are gone the connection is closed, never reused.
    #[instrument(skip(self, listener))]
    pub async fn subscribe<L: MessageListener>(
        &mut self,
        listener: L,
        channels: &[&str],
    ) -> Result<Subscription> {
        self.enter_subscription(
            Box::new(listener),
            Command::new("SUBSCRIBE").args(channels),
            "SUBSCRIBE",
        )
        .await
    }

    /// Subscribe to glob patterns; see [`Client::subscribe`].
    #[instrument(skip(self, listener))]
    pub async fn psubscribe<L: MessageListener>(
        &mut self,
        listener: L,
        patterns: &[&str],
    ) -> Result<Subscription> {
        self.enter_subscription(
            Box::new(listener),
            Command::new("PSUBSCRIBE").args(patterns),
            "PSUBSCRIBE",
        )
        .await
    }

    /// Subscribe with a queueing listener and hand back the messages as a
    /// stream, for consumers that prefer pulling.
    pub async fn subscribe_stream(
        &mut self,
        channels: &[&str],
    ) -> Result<(Subscription, impl Stream<Item = Message>)> {
        let (listener, mut queue) = QueueListener::new();
        let subscription = self.subscribe(listener, channels).await?;

        // The stream ends when the reader task drops the listener.
        let stream = async_stream::stream! {
            while let Some(message) = queue.recv().await {
                yield message;
            }
        };
        Ok((subscription, stream))
    }

    /// The control handle of the live subscription, if any.
    pub fn subscription(&self) -> Option<Subscription> {
        self.subscription_handle()
            .filter(|handle| handle.is_alive())
            .map(|handle| handle.subscription())
    }

    async fn enter_subscription(
        &mut self,
        listener: Box<dyn MessageListener>,
        cmd: Command,
        name: &str,
    ) -> Result<Subscription> {
        if self.is_subscribed() {
            // Additive subscribes go through the existing subscription.
            return Err(Error::SubscribedMode(name.to_string()));
        }
        if self.is_pipelined() || self.in_transaction() {
            return Err(Error::Unsupported(format!(
                "{name} inside a pipeline or transaction"
            )));
        }

        let mut connection = self.take_connection_for_subscription()?;
        // The reader parks in blocking reads for as long as the
        // subscription lives.
        connection.set_read_timeout(None);

        if let Err(err) = connection.write_frame(&cmd.into_frame()).await {
            connection.close().await;
            return Err(err);
        }

        let handle = subscriber::spawn(connection, listener);
        let subscription = handle.subscription();
        self.install_subscription(handle);
        Ok(subscription)
    }
}
