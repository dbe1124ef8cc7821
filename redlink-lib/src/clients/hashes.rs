//! Hash commands.

use bytes::Bytes;

use crate::clients::Client;
use crate::cmd::Command;
use crate::value::{
    expect_bool, expect_bytes, expect_bytes_vec, expect_float, expect_int, expect_ok,
    expect_opt_bytes_vec, expect_pairs,
};
use crate::Result;

impl Client {
    /// Set `field` in the hash at `key`; true when the field is new.
    pub async fn hset(&mut self, key: &str, field: &str, value: Bytes) -> Result<bool> {
        self.dispatch_map(
            Command::new("HSET").arg(key).arg(field).arg(value),
            expect_bool,
        )
        .await
    }

    /// Set `field` only when it does not already exist.
    pub async fn hsetnx(&mut self, key: &str, field: &str, value: Bytes) -> Result<bool> {
        self.dispatch_map(
            Command::new("HSETNX").arg(key).arg(field).arg(value),
            expect_bool,
        )
        .await
    }

    pub async fn hget(&mut self, key: &str, field: &str) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("HGET").arg(key).arg(field), expect_bytes)
            .await
    }

    /// Set several fields at once.
    pub async fn hmset(&mut self, key: &str, pairs: &[(&str, Bytes)]) -> Result<()> {
        let mut cmd = Command::new("HMSET").arg(key);
        for (field, value) in pairs {
            cmd = cmd.arg(*field).arg(value.clone());
        }
        self.dispatch_map(cmd, expect_ok).await
    }

    /// Values of several fields; missing fields yield `None` in their
    /// slot.
    pub async fn hmget(&mut self, key: &str, fields: &[&str]) -> Result<Vec<Option<Bytes>>> {
        self.dispatch_map(
            Command::new("HMGET").arg(key).args(fields),
            expect_opt_bytes_vec,
        )
        .await
    }

    /// Delete `field`; true when it existed.
    pub async fn hdel(&mut self, key: &str, field: &str) -> Result<bool> {
        self.dispatch_map(Command::new("HDEL").arg(key).arg(field), expect_bool)
            .await
    }

    pub async fn hexists(&mut self, key: &str, field: &str) -> Result<bool> {
        self.dispatch_map(Command::new("HEXISTS").arg(key).arg(field), expect_bool)
            .await
    }

    pub async fn hkeys(&mut self, key: &str) -> Result<Vec<Bytes>> {
        self.dispatch_map(Command::new("HKEYS").arg(key), expect_bytes_vec)
            .await
    }

    pub async fn hvals(&mut self, key: &str) -> Result<Vec<Bytes>> {
        self.dispatch_map(Command::new("HVALS").arg(key), expect_bytes_vec)
            .await
    }

    /// Every field/value pair in the hash, in server order.
    pub async fn hgetall(&mut self, key: &str) -> Result<Vec<(Bytes, Bytes)>> {
        self.dispatch_map(Command::new("HGETALL").arg(key), expect_pairs)
            .await
    }

    pub async fn hlen(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("HLEN").arg(key), expect_int)
            .await
    }

    /// Add `delta` to the integer at `field`, returning the new value.
    pub async fn hincr_by(&mut self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.dispatch_map(
            Command::new("HINCRBY").arg(key).arg(field).arg(delta),
            expect_int,
        )
        .await
    }

    pub async fn hincr_by_float(&mut self, key: &str, field: &str, delta: f64) -> Result<f64> {
        self.dispatch_map(
            Command::new("HINCRBYFLOAT").arg(key).arg(field).arg(delta),
            expect_float,
        )
        .await
    }
}
