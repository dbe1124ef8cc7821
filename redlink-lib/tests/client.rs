//! Request/reply behavior of a single client in normal mode.

mod common;

use bytes::Bytes;
use redlink_lib::{Client, Error, SortOptions, SortResult};

#[tokio::test]
async fn set_then_get_round_trips() {
    let server = common::spawn(2, |idx, args| {
        if idx == 0 {
            assert_eq!(args[0], b"SET");
            assert_eq!(args[1], b"foo");
            assert_eq!(args[2], b"bar");
            common::ok()
        } else {
            assert_eq!(args[0], b"GET");
            assert_eq!(args[1], b"foo");
            common::bulk(b"bar")
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    client.set("foo", Bytes::from_static(b"bar")).await.unwrap();
    let value = client.get("foo").await.unwrap();
    assert_eq!(value, Some(Bytes::from_static(b"bar")));
}

#[tokio::test]
async fn missing_and_empty_values_are_distinct() {
    let server = common::spawn(2, |idx, _| {
        if idx == 0 {
            common::nil()
        } else {
            common::bulk(b"")
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    assert_eq!(client.get("missing").await.unwrap(), None);
    assert_eq!(client.get("empty").await.unwrap(), Some(Bytes::new()));
}

#[tokio::test]
async fn server_error_replies_surface_verbatim() {
    let server = common::spawn(1, |_, args| {
        assert_eq!(args[0], b"INCR");
        common::server_error("ERR value is not an integer or out of range")
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    let err = client.incr("k").await.unwrap_err();
    assert!(
        matches!(&err, Error::Server(msg) if msg == "ERR value is not an integer or out of range"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn connect_sends_auth_and_select() {
    let server = common::spawn(3, |idx, args| match idx {
        0 => {
            assert_eq!(args[0], b"AUTH");
            assert_eq!(args[1], b"s3cret");
            common::ok()
        }
        1 => {
            assert_eq!(args[0], b"SELECT");
            assert_eq!(args[1], b"3");
            common::ok()
        }
        _ => {
            assert_eq!(args[0], b"PING");
            common::simple("PONG")
        }
    })
    .await;

    let endpoint = server.endpoint().password("s3cret").database(3);
    let mut client = Client::connect(endpoint).await.unwrap();
    let pong = client.ping(None).await.unwrap();
    assert_eq!(pong, Bytes::from_static(b"PONG"));
}

#[tokio::test]
async fn typed_conversions_cover_the_reply_shapes() {
    let server = common::spawn(5, |idx, args| match idx {
        0 => {
            assert_eq!(args[0], b"LRANGE");
            common::array(&[common::bulk(b"a"), common::bulk(b"b")])
        }
        1 => {
            assert_eq!(args[0], b"HGETALL");
            common::array(&[
                common::bulk(b"field"),
                common::bulk(b"value"),
                common::bulk(b"other"),
                common::bulk(b"thing"),
            ])
        }
        2 => {
            assert_eq!(args[0], b"ZRANGE");
            assert_eq!(args[4], b"WITHSCORES");
            common::array(&[common::bulk(b"m"), common::bulk(b"1.5")])
        }
        3 => {
            assert_eq!(args[0], b"ZSCORE");
            common::nil()
        }
        _ => {
            assert_eq!(args[0], b"MGET");
            common::array(&[common::bulk(b"x"), common::nil()])
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();

    let range = client.lrange("l", 0, -1).await.unwrap();
    assert_eq!(range, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);

    let hash = client.hgetall("h").await.unwrap();
    assert_eq!(hash.len(), 2);
    assert_eq!(hash[0], (Bytes::from_static(b"field"), Bytes::from_static(b"value")));

    let scored = client.zrange_with_scores("z", 0, -1).await.unwrap();
    assert_eq!(scored, vec![(Bytes::from_static(b"m"), 1.5)]);

    assert_eq!(client.zscore("z", Bytes::from_static(b"nope")).await.unwrap(), None);

    let values = client.mget(&["a", "b"]).await.unwrap();
    assert_eq!(values, vec![Some(Bytes::from_static(b"x")), None]);
}

#[tokio::test]
async fn sort_returns_by_output_shape() {
    let server = common::spawn(2, |idx, args| {
        assert_eq!(args[0], b"SORT");
        if idx == 0 {
            assert_eq!(args[1], b"mylist");
            assert_eq!(args[2], b"ALPHA");
            common::array(&[common::bulk(b"a"), common::bulk(b"c")])
        } else {
            assert_eq!(args.last().unwrap(), b"dest");
            common::integer(2)
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();

    let options = SortOptions {
        alpha: true,
        ..SortOptions::default()
    };
    let sorted = client.sort("mylist", options).await.unwrap();
    assert_eq!(
        sorted,
        SortResult::Values(vec![
            Some(Bytes::from_static(b"a")),
            Some(Bytes::from_static(b"c"))
        ])
    );

    let stored = client
        .sort(
            "mylist",
            SortOptions {
                store: Some("dest".into()),
                ..SortOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(stored, SortResult::Stored(2));
}

#[tokio::test]
async fn operations_after_close_fail_and_close_is_idempotent() {
    let server = common::spawn(1, |_, _| common::ok()).await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    client.set("k", Bytes::from_static(b"v")).await.unwrap();

    client.close().await;
    client.close().await;

    let err = client.get("k").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost(_)), "got {err:?}");
    assert!(client.is_closed());
}

#[tokio::test]
async fn a_lost_connection_poisons_the_client() {
    // The server hangs up after one command.
    let server = common::spawn_drop(1, |_, _| common::ok()).await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    client.set("k", Bytes::from_static(b"v")).await.unwrap();

    let err = client.get("k").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost(_)), "got {err:?}");

    // And it stays lost.
    let err = client.incr("n").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionLost(_)), "got {err:?}");
}
