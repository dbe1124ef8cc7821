//! String commands.

use std::time::Duration;

use bytes::Bytes;

use crate::clients::Client;
use crate::cmd::Command;
use crate::value::{expect_bool, expect_bytes, expect_data, expect_float, expect_int, expect_ok, expect_opt_bytes_vec};
use crate::Result;

/// Bitwise operation for [`Client::bitop`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    /// Unary; takes exactly one source key.
    Not,
}

impl BitOp {
    fn name(self) -> &'static str {
        match self {
            BitOp::And => "AND",
            BitOp::Or => "OR",
            BitOp::Xor => "XOR",
            BitOp::Not => "NOT",
        }
    }
}

impl Client {
    /// Get the value of `key`.
    ///
    /// Returns `None` when the key does not exist; a present-but-empty
    /// value comes back as zero-length bytes.
    pub async fn get(&mut self, key: &str) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("GET").arg(key), expect_bytes)
            .await
    }

    /// Set `key` to hold `value`, discarding any previous value and TTL.
    pub async fn set(&mut self, key: &str, value: Bytes) -> Result<()> {
        self.dispatch_map(Command::new("SET").arg(key).arg(value), expect_ok)
            .await
    }

    /// Atomically set `key` and return its previous value.
    pub async fn getset(&mut self, key: &str, value: Bytes) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("GETSET").arg(key).arg(value), expect_bytes)
            .await
    }

    /// Set `key` only when it does not already exist.
    pub async fn setnx(&mut self, key: &str, value: Bytes) -> Result<bool> {
        self.dispatch_map(Command::new("SETNX").arg(key).arg(value), expect_bool)
            .await
    }

    /// Set `key` with an expiration, in whole seconds.
    pub async fn setex(&mut self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.dispatch_map(
            Command::new("SETEX").arg(key).arg(ttl.as_secs()).arg(value),
            expect_ok,
        )
        .await
    }

    /// Set `key` with a millisecond expiration.
    pub async fn psetex(&mut self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.dispatch_map(
            Command::new("PSETEX")
                .arg(key)
                .arg(ttl.as_millis() as u64)
                .arg(value),
            expect_ok,
        )
        .await
    }

    /// Get the values of several keys at once; missing keys yield `None`
    /// in their slot.
    pub async fn mget(&mut self, keys: &[&str]) -> Result<Vec<Option<Bytes>>> {
        self.dispatch_map(Command::new("MGET").args(keys), expect_opt_bytes_vec)
            .await
    }

    /// Set several keys at once.
    pub async fn mset(&mut self, pairs: &[(&str, Bytes)]) -> Result<()> {
        let mut cmd = Command::new("MSET");
        for (key, value) in pairs {
            cmd = cmd.arg(*key).arg(value.clone());
        }
        self.dispatch_map(cmd, expect_ok).await
    }

    /// Set several keys, only if none of them exists.
    pub async fn msetnx(&mut self, pairs: &[(&str, Bytes)]) -> Result<bool> {
        let mut cmd = Command::new("MSETNX");
        for (key, value) in pairs {
            cmd = cmd.arg(*key).arg(value.clone());
        }
        self.dispatch_map(cmd, expect_bool).await
    }

    /// Increment the integer value at `key` by one, returning the new
    /// value.
    pub async fn incr(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("INCR").arg(key), expect_int)
            .await
    }

    pub async fn incr_by(&mut self, key: &str, delta: i64) -> Result<i64> {
        self.dispatch_map(Command::new("INCRBY").arg(key).arg(delta), expect_int)
            .await
    }

    pub async fn incr_by_float(&mut self, key: &str, delta: f64) -> Result<f64> {
        self.dispatch_map(
            Command::new("INCRBYFLOAT").arg(key).arg(delta),
            expect_float,
        )
        .await
    }

    pub async fn decr(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("DECR").arg(key), expect_int)
            .await
    }

    pub async fn decr_by(&mut self, key: &str, delta: i64) -> Result<i64> {
        self.dispatch_map(Command::new("DECRBY").arg(key).arg(delta), expect_int)
            .await
    }

    /// Append to the string at `key`, returning the new length.
    pub async fn append(&mut self, key: &str, value: Bytes) -> Result<i64> {
        self.dispatch_map(Command::new("APPEND").arg(key).arg(value), expect_int)
            .await
    }

    /// The substring from `start` to `end` inclusive; negative offsets
    /// count from the end.
    pub async fn getrange(&mut self, key: &str, start: i64, end: i64) -> Result<Bytes> {
        self.dispatch_map(
            Command::new("GETRANGE").arg(key).arg(start).arg(end),
            expect_data,
        )
        .await
    }

    /// Overwrite part of the string at `key` starting at `offset`,
    /// returning the new length.
    pub async fn setrange(&mut self, key: &str, offset: u64, value: Bytes) -> Result<i64> {
        self.dispatch_map(
            Command::new("SETRANGE").arg(key).arg(offset).arg(value),
            expect_int,
        )
        .await
    }

    pub async fn strlen(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("STRLEN").arg(key), expect_int)
            .await
    }

    /// Set the bit at `offset`, returning the bit's previous value.
    pub async fn setbit(&mut self, key: &str, offset: u64, value: bool) -> Result<bool> {
        self.dispatch_map(
            Command::new("SETBIT")
                .arg(key)
                .arg(offset)
                .arg(i64::from(value)),
            expect_bool,
        )
        .await
    }

    pub async fn getbit(&mut self, key: &str, offset: u64) -> Result<bool> {
        self.dispatch_map(Command::new("GETBIT").arg(key).arg(offset), expect_bool)
            .await
    }

    /// Count set bits in the whole string.
    pub async fn bitcount(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("BITCOUNT").arg(key), expect_int)
            .await
    }

    /// Count set bits within a byte range.
    pub async fn bitcount_range(&mut self, key: &str, start: i64, end: i64) -> Result<i64> {
        self.dispatch_map(
            Command::new("BITCOUNT").arg(key).arg(start).arg(end),
            expect_int,
        )
        .await
    }

    /// Combine `keys` bitwise into `dest`, returning the result length.
    pub async fn bitop(&mut self, op: BitOp, dest: &str, keys: &[&str]) -> Result<i64> {
        self.dispatch_map(
            Command::new("BITOP").arg(op.name()).arg(dest).args(keys),
            expect_int,
        )
        .await
    }
}
