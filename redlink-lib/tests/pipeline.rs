//! Pipelined submission: ordering, partial failure, loss mid-flush.

mod common;

use bytes::Bytes;
use redlink_lib::{Client, Error, Value};

#[tokio::test]
async fn results_come_back_in_submission_order() {
    let server = common::spawn(3, |idx, args| match idx {
        0 => {
            assert_eq!(args[0], b"INCR");
            common::integer(1)
        }
        1 => {
            assert_eq!(args[0], b"SET");
            common::ok()
        }
        _ => {
            assert_eq!(args[0], b"GET");
            common::bulk(b"v")
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    client.open_pipeline().unwrap();

    // Sentinels only; the contract is that these are not inspected.
    let _ = client.incr("n").await.unwrap();
    client.set("k", Bytes::from_static(b"v")).await.unwrap();
    let _ = client.get("k").await.unwrap();

    let results = client.close_pipeline().await.unwrap();
    assert_eq!(
        results,
        vec![
            Value::Int(1),
            Value::Status("OK".into()),
            Value::Bytes(Bytes::from_static(b"v")),
        ]
    );
    assert!(!client.is_pipelined());
}

#[tokio::test]
async fn pipelined_dispatch_returns_the_typed_nil() {
    let server = common::spawn(2, |_, _| common::integer(7)).await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    client.open_pipeline().unwrap();

    assert_eq!(client.incr("n").await.unwrap(), 0);
    assert_eq!(client.get("k").await.unwrap(), None);

    let results = client.close_pipeline().await.unwrap();
    assert_eq!(results, vec![Value::Int(7), Value::Int(7)]);
}

#[tokio::test]
async fn partial_failure_carries_the_full_outcome_list() {
    let server = common::spawn(2, |idx, _| {
        if idx == 0 {
            common::server_error("ERR value is not an integer or out of range")
        } else {
            common::bulk(b"abc")
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    client.open_pipeline().unwrap();
    let _ = client.incr("k").await.unwrap();
    let _ = client.get("k").await.unwrap();

    let err = client.close_pipeline().await.unwrap_err();
    let Error::PipelinePartial(outcomes) = err else {
        panic!("expected PipelinePartial");
    };
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(
        &outcomes[0],
        Err(Error::Server(msg)) if msg == "ERR value is not an integer or out of range"
    ));
    assert!(matches!(
        &outcomes[1],
        Ok(Value::Bytes(data)) if data.as_ref() == b"abc"
    ));
}

#[tokio::test]
async fn connection_loss_mid_flush_fills_the_remaining_slots() {
    // All three commands are read, but only the first reply ever arrives.
    let server = common::spawn_drop(3, |idx, _| {
        if idx == 0 {
            common::integer(1)
        } else {
            Vec::new()
        }
    })
    .await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    client.open_pipeline().unwrap();
    let _ = client.incr("a").await.unwrap();
    let _ = client.incr("b").await.unwrap();
    let _ = client.incr("c").await.unwrap();

    let err = client.close_pipeline().await.unwrap_err();
    let Error::PipelinePartial(outcomes) = err else {
        panic!("expected PipelinePartial");
    };
    assert_eq!(outcomes.len(), 3);
    assert!(matches!(&outcomes[0], Ok(Value::Int(1))));
    assert!(matches!(&outcomes[1], Err(Error::ConnectionLost(_))));
    assert!(matches!(&outcomes[2], Err(Error::ConnectionLost(_))));

    assert!(client.is_closed());
}

#[tokio::test]
async fn open_pipeline_is_idempotent() {
    let server = common::spawn(1, |_, _| common::integer(1)).await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    client.open_pipeline().unwrap();
    client.open_pipeline().unwrap();
    let _ = client.incr("n").await.unwrap();

    let results = client.close_pipeline().await.unwrap();
    assert_eq!(results, vec![Value::Int(1)]);
}

#[tokio::test]
async fn close_without_open_is_an_invalid_state() {
    let server = common::spawn(0, |_, _| Vec::new()).await;

    let mut client = Client::connect(server.endpoint()).await.unwrap();
    let err = client.close_pipeline().await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)), "got {err:?}");
}
