#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]

use redlink_lib::{Client, Endpoint, QueueListener};

type DemoResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
pub async fn main() -> DemoResult {
    let mut client = Client::connect(Endpoint::default()).await?;
    let mut client_2 = Client::connect(Endpoint::default()).await?;

    client.set("hello", "world".into()).await?;
    let result = client.get("hello").await?;
    println!("got value from the server; success={:?}", result.is_some());

    // A pipelined batch: both commands are on the wire before either reply
    // is read.
    client.open_pipeline()?;
    client.incr("demo-counter").await?;
    client.incr("demo-counter").await?;
    let results = client.close_pipeline().await?;
    println!("pipelined increments returned {results:?}");

    // subscribe to channel foo
    let (listener, mut messages) = QueueListener::new();
    client.subscribe(listener, &["foo"]).await?;
    // publish message `bar` on channel foo
    client_2.publish("foo", "bar".into()).await?;
    // await the message on channel foo
    if let Some(msg) = messages.recv().await {
        println!("channel: {} ==> message = {:?}", msg.channel, msg.payload);
    }

    Ok(())
}
