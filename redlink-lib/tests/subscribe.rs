//! The subscription machine: push delivery, mode exclusivity, teardown.

mod common;

use std::time::Duration;

use bytes::Bytes;
use redlink_lib::{Client, Error, QueueListener};
use tokio::time::timeout;

async fn recv(
    queue: &mut tokio::sync::mpsc::UnboundedReceiver<redlink_lib::Message>,
) -> Option<redlink_lib::Message> {
    timeout(Duration::from_secs(5), queue.recv())
        .await
        .expect("timed out waiting for a message")
}

#[tokio::test]
async fn subscribe_delivers_pushed_messages_and_publish_counts_receivers() {
    // Subscriber connection: the ack, then a push.
    // Publisher connection: a plain PUBLISH.
    let server = common::spawn_conns(vec![
        (1, |_, args: &[Vec<u8>]| {
            assert_eq!(args[0], b"SUBSCRIBE");
            assert_eq!(args[1], b"ch");
            common::concat(&[
                common::sub_ack("subscribe", "ch", 1),
                common::push_message("ch", b"hello"),
            ])
        }),
        (1, |_, args: &[Vec<u8>]| {
            assert_eq!(args[0], b"PUBLISH");
            assert_eq!(args[1], b"ch");
            assert_eq!(args[2], b"hello");
            common::integer(1)
        }),
    ])
    .await;

    let mut subscriber = Client::connect(server.endpoint()).await.unwrap();
    let (listener, mut queue) = QueueListener::new();
    let subscription = subscriber.subscribe(listener, &["ch"]).await.unwrap();

    let message = recv(&mut queue).await.expect("a pushed message");
    assert_eq!(message.channel, "ch");
    assert_eq!(message.pattern, None);
    assert_eq!(message.payload, Bytes::from_static(b"hello"));
    assert!(subscription.is_alive());
    assert!(subscriber.is_subscribed());
    // The ack preceded the push, so the bookkeeping has seen it.
    assert_eq!(subscription.channels(), vec!["ch".to_string()]);

    let mut publisher = Client::connect(server.endpoint()).await.unwrap();
    let receivers = publisher
        .publish("ch", Bytes::from_static(b"hello"))
        .await
        .unwrap();
    assert_eq!(receivers, 1);
}

#[tokio::test]
async fn subscribed_mode_rejects_normal_commands() {
    let server = common::spawn(1, |_, _| common::sub_ack("subscribe", "ch", 1)).await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    let (listener, _queue) = QueueListener::new();
    client.subscribe(listener, &["ch"]).await.unwrap();

    let err = client.get("k").await.unwrap_err();
    assert!(
        matches!(&err, Error::SubscribedMode(name) if name == "GET"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn subscribing_again_is_additive_through_the_subscription() {
    let server = common::spawn(2, |idx, args: &[Vec<u8>]| {
        if idx == 0 {
            assert_eq!(args[0], b"SUBSCRIBE");
            assert_eq!(args[1], b"one");
            common::sub_ack("subscribe", "one", 1)
        } else {
            assert_eq!(args[0], b"SUBSCRIBE");
            assert_eq!(args[1], b"two");
            common::sub_ack("subscribe", "two", 2)
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    let (listener, _queue) = QueueListener::new();
    let subscription = client.subscribe(listener, &["one"]).await.unwrap();

    subscription.subscribe(&["two"]).unwrap();

    // The ack is consumed by the reader task, not the caller; wait for the
    // bookkeeping to catch up.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !subscription.channels().contains(&"two".to_string()) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "subscribe ack never processed"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // A second listener-carrying subscribe on the same client is rejected;
    // additions go through the subscription handle.
    let (other, _q) = QueueListener::new();
    let err = client.subscribe(other, &["three"]).await.unwrap_err();
    assert!(matches!(err, Error::SubscribedMode(_)), "got {err:?}");
}

#[tokio::test]
async fn unsubscribing_everything_ends_the_subscription_and_closes_the_client() {
    let server = common::spawn(2, |idx, args: &[Vec<u8>]| {
        if idx == 0 {
            assert_eq!(args[0], b"SUBSCRIBE");
            common::sub_ack("subscribe", "ch", 1)
        } else {
            assert_eq!(args[0], b"UNSUBSCRIBE");
            common::sub_ack("unsubscribe", "ch", 0)
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    let (listener, mut queue) = QueueListener::new();
    let subscription = client.subscribe(listener, &["ch"]).await.unwrap();

    subscription.unsubscribe(&[]).unwrap();

    // The reader drops the listener on exit, ending the queue.
    let done = timeout(Duration::from_secs(5), queue.recv()).await;
    assert!(done.expect("reader should exit").is_none());

    assert!(!subscription.is_alive());
    assert!(client.is_closed());

    let err = client.get("k").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost(_)), "got {err:?}");
}

#[tokio::test]
async fn closing_the_client_tears_down_a_live_subscription() {
    let server = common::spawn(1, |_, _| common::sub_ack("subscribe", "ch", 1)).await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    let (listener, mut queue) = QueueListener::new();
    let subscription = client.subscribe(listener, &["ch"]).await.unwrap();

    client.close().await;

    assert!(!subscription.is_alive());
    assert!(client.is_closed());
    assert!(queue.recv().await.is_none());

    let err = subscription.subscribe(&["more"]).unwrap_err();
    assert!(matches!(err, Error::ConnectionLost(_)), "got {err:?}");
}

#[tokio::test]
async fn pattern_messages_carry_the_matching_pattern() {
    let server = common::spawn(1, |_, args: &[Vec<u8>]| {
        assert_eq!(args[0], b"PSUBSCRIBE");
        assert_eq!(args[1], b"news.*");
        common::concat(&[
            common::sub_ack("psubscribe", "news.*", 1),
            common::array(&[
                common::bulk(b"pmessage"),
                common::bulk(b"news.*"),
                common::bulk(b"news.tech"),
                common::bulk(b"payload"),
            ]),
        ])
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    let (listener, mut queue) = QueueListener::new();
    let subscription = client.psubscribe(listener, &["news.*"]).await.unwrap();

    let message = recv(&mut queue).await.expect("a pushed pmessage");
    assert_eq!(message.pattern.as_deref(), Some("news.*"));
    assert_eq!(message.channel, "news.tech");
    assert_eq!(message.payload, Bytes::from_static(b"payload"));
    assert_eq!(subscription.patterns(), vec!["news.*".to_string()]);
    assert!(subscription.channels().is_empty());
}

#[tokio::test]
async fn subscribe_is_not_allowed_inside_a_pipeline_or_transaction() {
    let server = common::spawn(1, |_, args: &[Vec<u8>]| {
        assert_eq!(args[0], b"MULTI");
        common::ok()
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    client.multi().await.unwrap();

    let (listener, _queue) = QueueListener::new();
    let err = client.subscribe(listener, &["ch"]).await.unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)), "got {err:?}");
}

#[tokio::test]
async fn the_stream_facade_yields_messages_until_teardown() {
    use tokio_stream::StreamExt;

    let server = common::spawn(2, |idx, _| {
        if idx == 0 {
            common::concat(&[
                common::sub_ack("subscribe", "ch", 1),
                common::push_message("ch", b"one"),
                common::push_message("ch", b"two"),
            ])
        } else {
            common::sub_ack("unsubscribe", "ch", 0)
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    let (subscription, stream) = client.subscribe_stream(&["ch"]).await.unwrap();
    tokio::pin!(stream);

    let first = timeout(Duration::from_secs(5), stream.next()).await.unwrap();
    assert_eq!(first.unwrap().payload, Bytes::from_static(b"one"));
    let second = timeout(Duration::from_secs(5), stream.next()).await.unwrap();
    assert_eq!(second.unwrap().payload, Bytes::from_static(b"two"));

    subscription.unsubscribe(&[]).unwrap();
    let end = timeout(Duration::from_secs(5), stream.next()).await.unwrap();
    assert!(end.is_none());
}
