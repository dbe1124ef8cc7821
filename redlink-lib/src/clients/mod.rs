//! The client types: the connection core and the typed operation surface.
//!
//! `client` holds the state machine; the sibling modules each contribute a
//! family of typed command methods on [`Client`]. `subscriber` is the
//! pub/sub machine a subscribed client hands its connection to.

pub mod client;
pub use client::{Client, Endpoint};

mod subscriber;
pub use subscriber::{Message, MessageListener, QueueListener, Subscription};

mod hashes;
mod keys;
mod lists;
mod pubsub;
mod scripting;
mod server;
mod sets;
mod strings;
mod zsets;

pub use keys::{SortOptions, SortOrder, SortResult};
pub use lists::ListPosition;
pub use strings::BitOp;
