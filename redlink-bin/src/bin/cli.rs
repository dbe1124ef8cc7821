use bytes::Bytes;
use clap::{Parser, Subcommand};
use redlink_lib::{Client, Endpoint, DEFAULT_PORT};
use std::num::ParseIntError;
use std::str;
use std::time::Duration;
use tokio_stream::StreamExt;

#[derive(Parser, Debug)]
#[command(name = "redlink-cli", version, author, about = "Issue commands against a server")]
struct CliCommand {
    #[clap(subcommand)]
    sub_cmd: Command,

    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    #[clap(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Database index to SELECT on connect.
    #[clap(long, default_value_t = 0)]
    db: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping {
        echo: Option<String>,
    },
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
        /// Expiration in milliseconds.
        #[clap(value_parser = duration_from)]
        expires: Option<Duration>,
    },
    Incr {
        key: String,
    },
    Publish {
        channel: String,
        message: String,
    },
    Subscribe {
        channels: Vec<String>,
    },
}

fn duration_from(src: &str) -> Result<Duration, ParseIntError> {
    let ms = src.parse::<u64>()?;
    Ok(Duration::from_millis(ms))
}

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// `flavor = "current_thread"` keeps the CLI light; one connection needs no
/// worker threads.
#[tokio::main(flavor = "current_thread")]
async fn main() -> CliResult {
    // Enable logging
    tracing_subscriber::fmt::try_init()?;

    let cmd = CliCommand::parse();

    let endpoint = Endpoint::new(format!("{}:{}", cmd.host, cmd.port)).database(cmd.db);
    let mut client = Client::connect(endpoint).await?;

    match cmd.sub_cmd {
        Command::Ping { echo } => {
            let reply = client.ping(echo.map(Bytes::from)).await?;
            print_bytes(&reply);
        }
        Command::Get { key } => {
            if let Some(bytes) = client.get(&key).await? {
                print_bytes(&bytes);
            } else {
                println!("(nil)");
            }
        }
        Command::Set {
            key,
            value,
            expires: None,
        } => {
            client.set(&key, Bytes::from(value)).await?;
            println!("OK");
        }
        Command::Set {
            key,
            value,
            expires: Some(expires),
        } => {
            client.psetex(&key, Bytes::from(value), expires).await?;
            println!("OK");
        }
        Command::Incr { key } => {
            println!("{}", client.incr(&key).await?);
        }
        Command::Publish { channel, message } => {
            let receivers = client.publish(&channel, Bytes::from(message)).await?;
            println!("{receivers} receiver(s)");
        }
        Command::Subscribe { channels } => {
            if channels.is_empty() {
                return Err("channel(s) must be provided".into());
            }
            let channels: Vec<&str> = channels.iter().map(String::as_str).collect();
            let (_subscription, stream) = client.subscribe_stream(&channels).await?;
            tokio::pin!(stream);

            while let Some(message) = stream.next().await {
                print!("[{}] ", message.channel);
                print_bytes(&message.payload);
            }
        }
    }

    Ok(())
}

fn print_bytes(bytes: &[u8]) {
    if let Ok(string) = str::from_utf8(bytes) {
        println!("\"{string}\"");
    } else {
        println!("{bytes:?}");
    }
}
