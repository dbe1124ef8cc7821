//! List commands, including the blocking pops.

use std::time::Duration;

use bytes::Bytes;

use crate::clients::Client;
use crate::cmd::Command;
use crate::value::{expect_bytes, expect_bytes_vec, expect_int, expect_keyed_pop, expect_ok};
use crate::Result;

/// Pivot side for [`Client::linsert`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListPosition {
    Before,
    After,
}

impl ListPosition {
    fn name(self) -> &'static str {
        match self {
            ListPosition::Before => "BEFORE",
            ListPosition::After => "AFTER",
        }
    }
}

impl Client {
    /// Prepend to the list at `key`, returning the new length.
    pub async fn lpush(&mut self, key: &str, value: Bytes) -> Result<i64> {
        self.dispatch_map(Command::new("LPUSH").arg(key).arg(value), expect_int)
            .await
    }

    /// Append to the list at `key`, returning the new length.
    pub async fn rpush(&mut self, key: &str, value: Bytes) -> Result<i64> {
        self.dispatch_map(Command::new("RPUSH").arg(key).arg(value), expect_int)
            .await
    }

    /// Prepend only when the list already exists.
    pub async fn lpushx(&mut self, key: &str, value: Bytes) -> Result<i64> {
        self.dispatch_map(Command::new("LPUSHX").arg(key).arg(value), expect_int)
            .await
    }

    /// Append only when the list already exists.
    pub async fn rpushx(&mut self, key: &str, value: Bytes) -> Result<i64> {
        self.dispatch_map(Command::new("RPUSHX").arg(key).arg(value), expect_int)
            .await
    }

    pub async fn lpop(&mut self, key: &str) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("LPOP").arg(key), expect_bytes)
            .await
    }

    pub async fn rpop(&mut self, key: &str) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("RPOP").arg(key), expect_bytes)
            .await
    }

    /// Elements from `start` to `stop` inclusive; negative offsets count
    /// from the tail.
    pub async fn lrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        self.dispatch_map(
            Command::new("LRANGE").arg(key).arg(start).arg(stop),
            expect_bytes_vec,
        )
        .await
    }

    pub async fn llen(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("LLEN").arg(key), expect_int)
            .await
    }

    pub async fn lindex(&mut self, key: &str, index: i64) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("LINDEX").arg(key).arg(index), expect_bytes)
            .await
    }

    /// Insert `value` next to `pivot`; returns the new length, or -1 when
    /// the pivot was not found.
    pub async fn linsert(
        &mut self,
        key: &str,
        position: ListPosition,
        pivot: Bytes,
        value: Bytes,
    ) -> Result<i64> {
        self.dispatch_map(
            Command::new("LINSERT")
                .arg(key)
                .arg(position.name())
                .arg(pivot)
                .arg(value),
            expect_int,
        )
        .await
    }

    /// Remove up to `count` occurrences of `value` (sign picks the scan
    /// direction, zero removes all), returning how many went away.
    pub async fn lrem(&mut self, key: &str, count: i64, value: Bytes) -> Result<i64> {
        self.dispatch_map(
            Command::new("LREM").arg(key).arg(count).arg(value),
            expect_int,
        )
        .await
    }

    pub async fn lset(&mut self, key: &str, index: i64, value: Bytes) -> Result<()> {
        self.dispatch_map(
            Command::new("LSET").arg(key).arg(index).arg(value),
            expect_ok,
        )
        .await
    }

    /// Trim the list to the inclusive range.
    pub async fn ltrim(&mut self, key: &str, start: i64, stop: i64) -> Result<()> {
        self.dispatch_map(
            Command::new("LTRIM").arg(key).arg(start).arg(stop),
            expect_ok,
        )
        .await
    }

    /// Atomically pop the tail of `source` and push it onto the head of
    /// `destination`.
    pub async fn rpoplpush(&mut self, source: &str, destination: &str) -> Result<Option<Bytes>> {
        self.dispatch_map(
            Command::new("RPOPLPUSH").arg(source).arg(destination),
            expect_bytes,
        )
        .await
    }

    /// Blocking pop from the head of the first non-empty list.
    ///
    /// Waits up to `timeout` (whole seconds; zero blocks forever) and
    /// returns the popped key and element, or `None` on timeout. Not
    /// allowed inside MULTI: the server would queue it and the block could
    /// never complete.
    pub async fn blpop(
        &mut self,
        keys: &[&str],
        timeout: Duration,
    ) -> Result<Option<(String, Bytes)>> {
        self.dispatch_blocking_map(
            Command::new("BLPOP").args(keys).arg(timeout.as_secs()),
            expect_keyed_pop,
        )
        .await
    }

    /// Blocking pop from the tail; see [`Client::blpop`].
    pub async fn brpop(
        &mut self,
        keys: &[&str],
        timeout: Duration,
    ) -> Result<Option<(String, Bytes)>> {
        self.dispatch_blocking_map(
            Command::new("BRPOP").args(keys).arg(timeout.as_secs()),
            expect_keyed_pop,
        )
        .await
    }

    /// Blocking [`Client::rpoplpush`]; `None` on timeout.
    pub async fn brpoplpush(
        &mut self,
        source: &str,
        destination: &str,
        timeout: Duration,
    ) -> Result<Option<Bytes>> {
        self.dispatch_blocking_map(
            Command::new("BRPOPLPUSH")
                .arg(source)
                .arg(destination)
                .arg(timeout.as_secs()),
            expect_bytes,
        )
        .await
    }
}
