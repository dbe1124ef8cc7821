//! Set commands.

use bytes::Bytes;

use crate::clients::Client;
use crate::cmd::Command;
use crate::value::{expect_bool, expect_bytes, expect_bytes_vec, expect_int};
use crate::Result;

impl Client {
    /// Add `member` to the set at `key`; true when it was not already
    /// present.
    pub async fn sadd(&mut self, key: &str, member: Bytes) -> Result<bool> {
        self.dispatch_map(Command::new("SADD").arg(key).arg(member), expect_bool)
            .await
    }

    /// Remove `member`; true when it was present.
    pub async fn srem(&mut self, key: &str, member: Bytes) -> Result<bool> {
        self.dispatch_map(Command::new("SREM").arg(key).arg(member), expect_bool)
            .await
    }

    /// Remove and return a random member.
    pub async fn spop(&mut self, key: &str) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("SPOP").arg(key), expect_bytes)
            .await
    }

    /// Return a random member without removing it.
    pub async fn srandmember(&mut self, key: &str) -> Result<Option<Bytes>> {
        self.dispatch_map(Command::new("SRANDMEMBER").arg(key), expect_bytes)
            .await
    }

    /// Move `member` between sets; true when it was moved.
    pub async fn smove(&mut self, source: &str, destination: &str, member: Bytes) -> Result<bool> {
        self.dispatch_map(
            Command::new("SMOVE").arg(source).arg(destination).arg(member),
            expect_bool,
        )
        .await
    }

    pub async fn scard(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("SCARD").arg(key), expect_int)
            .await
    }

    pub async fn sismember(&mut self, key: &str, member: Bytes) -> Result<bool> {
        self.dispatch_map(
            Command::new("SISMEMBER").arg(key).arg(member),
            expect_bool,
        )
        .await
    }

    pub async fn smembers(&mut self, key: &str) -> Result<Vec<Bytes>> {
        self.dispatch_map(Command::new("SMEMBERS").arg(key), expect_bytes_vec)
            .await
    }

    /// Intersection of all `keys`.
    pub async fn sinter(&mut self, keys: &[&str]) -> Result<Vec<Bytes>> {
        self.dispatch_map(Command::new("SINTER").args(keys), expect_bytes_vec)
            .await
    }

    /// Store the intersection of `keys` into `destination`, returning its
    /// cardinality.
    pub async fn sinterstore(&mut self, destination: &str, keys: &[&str]) -> Result<i64> {
        self.dispatch_map(
            Command::new("SINTERSTORE").arg(destination).args(keys),
            expect_int,
        )
        .await
    }

    pub async fn sunion(&mut self, keys: &[&str]) -> Result<Vec<Bytes>> {
        self.dispatch_map(Command::new("SUNION").args(keys), expect_bytes_vec)
            .await
    }

    pub async fn sunionstore(&mut self, destination: &str, keys: &[&str]) -> Result<i64> {
        self.dispatch_map(
            Command::new("SUNIONSTORE").arg(destination).args(keys),
            expect_int,
        )
        .await
    }

    /// Difference of the first key against the rest.
    pub async fn sdiff(&mut self, keys: &[&str]) -> Result<Vec<Bytes>> {
        self.dispatch_map(Command::new("SDIFF").args(keys), expect_bytes_vec)
            .await
    }

    pub async fn sdiffstore(&mut self, destination: &str, keys: &[&str]) -> Result<i64> {
        self.dispatch_map(
            Command::new("SDIFFSTORE").arg(destination).args(keys),
            expect_int,
        )
        .await
    }
}
