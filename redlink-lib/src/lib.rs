//! Client core for RESP-speaking in-memory data-structure servers.
//!
//! The major components are:
//! * `clients`: the connection core (`Client`) and its typed command
//!   surface, plus the pub/sub subscription machine.
//! * `frame`: a single protocol frame and its codec.
//! * `cmd`: the generic command builder the surface dispatches through.
//! * `pool`: a bounded pool of clients keyed by endpoint.
//!
//! One `Client` owns one TCP connection and is used by one caller at a
//! time; the pool enforces that under parallelism. On a single client,
//! replies always come back in submission order, which is what makes
//! pipelining and transactions composable on the same wire.

#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]

pub mod clients;
pub use clients::{
    BitOp, Client, Endpoint, ListPosition, Message, MessageListener, QueueListener, SortOptions,
    SortOrder, SortResult, Subscription,
};

pub mod cmd;
pub use cmd::{Command, ToArg};

mod connection;

pub mod frame;
pub use frame::Frame;

mod error;
pub use error::{Error, Outcome, Result};

mod value;
pub use value::Value;

pub mod pool;
pub use pool::{Pool, PoolConfig, PooledClient};

mod counter;
pub use counter::AtomicCounter;

/// Default port that the server listens on.
pub const DEFAULT_PORT: u16 = 6379;
