//! Generic key commands: lifetime, expiration, migration, SORT.

use std::time::Duration;

use bytes::Bytes;

use crate::clients::Client;
use crate::cmd::Command;
use crate::frame::Frame;
use crate::value::{
    expect_bool, expect_bytes, expect_bytes_vec, expect_int, expect_ok, expect_opt_bytes_vec,
    expect_string,
};
use crate::{Error, Result};

/// Options for [`Client::sort`]. Defaults to a plain numeric ascending
/// sort of the elements themselves.
#[derive(Clone, Debug, Default)]
pub struct SortOptions {
    /// `BY` pattern for external sort weights.
    pub by: Option<String>,
    /// `LIMIT offset count` window.
    pub limit: Option<(i64, i64)>,
    /// `GET` patterns; each produces one entry per element.
    pub get: Vec<String>,
    pub order: SortOrder,
    /// Sort lexicographically instead of numerically.
    pub alpha: bool,
    /// `STORE` destination; changes the reply shape to a count.
    pub store: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// The shape-dependent reply of `SORT`: a count with `STORE`, the sorted
/// elements without.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum SortResult {
    #[default]
    Pending,
    Stored(i64),
    Values(Vec<Option<Bytes>>),
}

impl SortOptions {
    fn apply(self, mut cmd: Command) -> Command {
        if let Some(by) = self.by {
            cmd = cmd.arg("BY").arg(by);
        }
        if let Some((offset, count)) = self.limit {
            cmd = cmd.arg("LIMIT").arg(offset).arg(count);
        }
        for pattern in self.get {
            cmd = cmd.arg("GET").arg(pattern);
        }
        if self.order == SortOrder::Descending {
            cmd = cmd.arg("DESC");
        }
        if self.alpha {
            cmd = cmd.arg("ALPHA");
        }
        if let Some(store) = self.store {
            cmd = cmd.arg("STORE").arg(store);
        }
        cmd
    }
}

impl Client {
    /// Delete keys, returning how many existed.
    pub async fn del(&mut self, keys: &[&str]) -> Result<i64> {
        self.dispatch_map(Command::new("DEL").args(keys), expect_int)
            .await
    }

    pub async fn exists(&mut self, key: &str) -> Result<bool> {
        self.dispatch_map(Command::new("EXISTS").arg(key), expect_bool)
            .await
    }

    /// Every key matching the glob `pattern`. Walks the whole keyspace.
    pub async fn keys(&mut self, pattern: &str) -> Result<Vec<Bytes>> {
        self.dispatch_map(Command::new("KEYS").arg(pattern), expect_bytes_vec)
            .await
    }

    /// The type of the value at `key` (`string`, `list`, `none`, ...).
    pub async fn key_type(&mut self, key: &str) -> Result<String> {
        self.dispatch_map(Command::new("TYPE").arg(key), expect_string)
            .await
    }

    pub async fn rename(&mut self, key: &str, new_key: &str) -> Result<()> {
        self.dispatch_map(Command::new("RENAME").arg(key).arg(new_key), expect_ok)
            .await
    }

    /// Rename only when `new_key` does not exist; true when renamed.
    pub async fn renamenx(&mut self, key: &str, new_key: &str) -> Result<bool> {
        self.dispatch_map(Command::new("RENAMENX").arg(key).arg(new_key), expect_bool)
            .await
    }

    /// Expire `key` after `ttl` (whole seconds); true when the timer was
    /// set.
    pub async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool> {
        self.dispatch_map(
            Command::new("EXPIRE").arg(key).arg(ttl.as_secs()),
            expect_bool,
        )
        .await
    }

    /// Millisecond-resolution [`Client::expire`].
    pub async fn pexpire(&mut self, key: &str, ttl: Duration) -> Result<bool> {
        self.dispatch_map(
            Command::new("PEXPIRE").arg(key).arg(ttl.as_millis() as u64),
            expect_bool,
        )
        .await
    }

    /// Expire `key` at a unix timestamp in seconds.
    pub async fn expire_at(&mut self, key: &str, unix_secs: i64) -> Result<bool> {
        self.dispatch_map(
            Command::new("EXPIREAT").arg(key).arg(unix_secs),
            expect_bool,
        )
        .await
    }

    pub async fn pexpire_at(&mut self, key: &str, unix_millis: i64) -> Result<bool> {
        self.dispatch_map(
            Command::new("PEXPIREAT").arg(key).arg(unix_millis),
            expect_bool,
        )
        .await
    }

    /// Seconds until expiry: -1 when persistent, -2 when missing.
    pub async fn ttl(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("TTL").arg(key), expect_int)
            .await
    }

    /// Milliseconds until expiry: -1 when persistent, -2 when missing.
    pub async fn pttl(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("PTTL").arg(key), expect_int)
            .await
    }

    /// Drop the expiration timer; true when one was removed.
    pub async fn persist(&mut self, key: &str) -> Result<bool> {
        self.dispatch_map(Command::new("PERSIST").arg(key), expect_bool)
            .await
    }

    /// A random key from the current database, or `None` when empty.
    pub async fn random_key(&mut self) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("RANDOMKEY"), expect_bytes)
            .await
    }

    /// Move `key` to another database; true when moved.
    pub async fn move_key(&mut self, key: &str, database: u32) -> Result<bool> {
        self.dispatch_map(Command::new("MOVE").arg(key).arg(database), expect_bool)
            .await
    }

    /// A serialized, opaque representation of the value at `key`.
    pub async fn dump(&mut self, key: &str) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("DUMP").arg(key), expect_bytes)
            .await
    }

    /// Materialize a [`Client::dump`] payload under `key`; `ttl` of zero
    /// means no expiration.
    pub async fn restore(&mut self, key: &str, ttl_millis: u64, payload: Bytes) -> Result<()> {
        self.dispatch_map(
            Command::new("RESTORE").arg(key).arg(ttl_millis).arg(payload),
            expect_ok,
        )
        .await
    }

    /// Sort the list, set, or sorted set at `key`.
    ///
    /// One method covers both reply shapes: with `STORE` the server
    /// answers a count ([`SortResult::Stored`]); without, the sorted
    /// elements ([`SortResult::Values`]).
    pub async fn sort(&mut self, key: &str, options: SortOptions) -> Result<SortResult> {
        let stored = options.store.is_some();
        let cmd = options.apply(Command::new("SORT").arg(key));
        self.dispatch_map(cmd, move |frame| sort_result(frame, stored))
            .await
    }
}

fn sort_result(frame: Frame, stored: bool) -> Result<SortResult> {
    if stored {
        return match frame {
            Frame::Integer(count) => Ok(SortResult::Stored(count)),
            frame => Err(Error::protocol(format!(
                "expected a count from SORT STORE, got {frame:?}"
            ))),
        };
    }
    expect_opt_bytes_vec(frame).map(SortResult::Values)
}
