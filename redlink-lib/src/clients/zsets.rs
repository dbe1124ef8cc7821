//! Sorted-set commands.
//!
//! Score-taking range commands accept `f64::INFINITY` /
//! `f64::NEG_INFINITY`, which encode as the server's `+inf` / `-inf`
//! bounds.

use bytes::Bytes;

use crate::clients::Client;
use crate::cmd::Command;
use crate::value::{
    expect_bool, expect_bytes_vec, expect_float, expect_int, expect_opt_float, expect_opt_int,
    expect_scored,
};
use crate::Result;

impl Client {
    /// Add `member` with `score`; true when it was newly added rather
    /// than re-scored.
    pub async fn zadd(&mut self, key: &str, score: f64, member: Bytes) -> Result<bool> {
        self.dispatch_map(
            Command::new("ZADD").arg(key).arg(score).arg(member),
            expect_bool,
        )
        .await
    }

    /// Remove `member`; true when it was present.
    pub async fn zrem(&mut self, key: &str, member: Bytes) -> Result<bool> {
        self.dispatch_map(Command::new("ZREM").arg(key).arg(member), expect_bool)
            .await
    }

    /// Add `delta` to the member's score, returning the new score.
    pub async fn zincrby(&mut self, key: &str, delta: f64, member: Bytes) -> Result<f64> {
        self.dispatch_map(
            Command::new("ZINCRBY").arg(key).arg(delta).arg(member),
            expect_float,
        )
        .await
    }

    /// Ascending rank of `member`, or `None` when absent.
    pub async fn zrank(&mut self, key: &str, member: Bytes) -> Result<Option<i64>> {
        self.dispatch_map(Command::new("ZRANK").arg(key).arg(member), expect_opt_int)
            .await
    }

    pub async fn zrevrank(&mut self, key: &str, member: Bytes) -> Result<Option<i64>> {
        self.dispatch_map(
            Command::new("ZREVRANK").arg(key).arg(member),
            expect_opt_int,
        )
        .await
    }

    /// Members between the inclusive ranks `start` and `stop`, ascending.
    pub async fn zrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        self.dispatch_map(
            Command::new("ZRANGE").arg(key).arg(start).arg(stop),
            expect_bytes_vec,
        )
        .await
    }

    pub async fn zrange_with_scores(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Bytes, f64)>> {
        self.dispatch_map(
            Command::new("ZRANGE")
                .arg(key)
                .arg(start)
                .arg(stop)
                .arg("WITHSCORES"),
            expect_scored,
        )
        .await
    }

    pub async fn zrevrange(&mut self, key: &str, start: i64, stop: i64) -> Result<Vec<Bytes>> {
        self.dispatch_map(
            Command::new("ZREVRANGE").arg(key).arg(start).arg(stop),
            expect_bytes_vec,
        )
        .await
    }

    pub async fn zrevrange_with_scores(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(Bytes, f64)>> {
        self.dispatch_map(
            Command::new("ZREVRANGE")
                .arg(key)
                .arg(start)
                .arg(stop)
                .arg("WITHSCORES"),
            expect_scored,
        )
        .await
    }

    /// Members whose scores fall in the inclusive `[min, max]` range.
    pub async fn zrangebyscore(&mut self, key: &str, min: f64, max: f64) -> Result<Vec<Bytes>> {
        self.dispatch_map(
            Command::new("ZRANGEBYSCORE").arg(key).arg(min).arg(max),
            expect_bytes_vec,
        )
        .await
    }

    pub async fn zrangebyscore_with_scores(
        &mut self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<(Bytes, f64)>> {
        self.dispatch_map(
            Command::new("ZRANGEBYSCORE")
                .arg(key)
                .arg(min)
                .arg(max)
                .arg("WITHSCORES"),
            expect_scored,
        )
        .await
    }

    /// Score range with a result window.
    pub async fn zrangebyscore_limit(
        &mut self,
        key: &str,
        min: f64,
        max: f64,
        offset: i64,
        count: i64,
    ) -> Result<Vec<Bytes>> {
        self.dispatch_map(
            Command::new("ZRANGEBYSCORE")
                .arg(key)
                .arg(min)
                .arg(max)
                .arg("LIMIT")
                .arg(offset)
                .arg(count),
            expect_bytes_vec,
        )
        .await
    }

    /// Descending score range; note the server takes `max` first.
    pub async fn zrevrangebyscore(&mut self, key: &str, max: f64, min: f64) -> Result<Vec<Bytes>> {
        self.dispatch_map(
            Command::new("ZREVRANGEBYSCORE").arg(key).arg(max).arg(min),
            expect_bytes_vec,
        )
        .await
    }

    pub async fn zrevrangebyscore_with_scores(
        &mut self,
        key: &str,
        max: f64,
        min: f64,
    ) -> Result<Vec<(Bytes, f64)>> {
        self.dispatch_map(
            Command::new("ZREVRANGEBYSCORE")
                .arg(key)
                .arg(max)
                .arg(min)
                .arg("WITHSCORES"),
            expect_scored,
        )
        .await
    }

    pub async fn zcard(&mut self, key: &str) -> Result<i64> {
        self.dispatch_map(Command::new("ZCARD").arg(key), expect_int)
            .await
    }

    /// How many members score within the inclusive `[min, max]` range.
    pub async fn zcount(&mut self, key: &str, min: f64, max: f64) -> Result<i64> {
        self.dispatch_map(
            Command::new("ZCOUNT").arg(key).arg(min).arg(max),
            expect_int,
        )
        .await
    }

    pub async fn zscore(&mut self, key: &str, member: Bytes) -> Result<Option<f64>> {
        self.dispatch_map(
            Command::new("ZSCORE").arg(key).arg(member),
            expect_opt_float,
        )
        .await
    }

    /// Remove members between the inclusive ranks, returning how many.
    pub async fn zremrangebyrank(&mut self, key: &str, start: i64, stop: i64) -> Result<i64> {
        self.dispatch_map(
            Command::new("ZREMRANGEBYRANK").arg(key).arg(start).arg(stop),
            expect_int,
        )
        .await
    }

    /// Remove members scoring within `[min, max]`, returning how many.
    pub async fn zremrangebyscore(&mut self, key: &str, min: f64, max: f64) -> Result<i64> {
        self.dispatch_map(
            Command::new("ZREMRANGEBYSCORE").arg(key).arg(min).arg(max),
            expect_int,
        )
        .await
    }

    /// Store the intersection of `keys` into `destination`, returning its
    /// cardinality.
    pub async fn zinterstore(&mut self, destination: &str, keys: &[&str]) -> Result<i64> {
        self.dispatch_map(
            Command::new("ZINTERSTORE")
                .arg(destination)
                .arg(keys.len())
                .args(keys),
            expect_int,
        )
        .await
    }

    /// Store the union of `keys` into `destination`, returning its
    /// cardinality.
    pub async fn zunionstore(&mut self, destination: &str, keys: &[&str]) -> Result<i64> {
        self.dispatch_map(
            Command::new("ZUNIONSTORE")
                .arg(destination)
                .arg(keys.len())
                .args(keys),
            expect_int,
        )
        .await
    }
}
