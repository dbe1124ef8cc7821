//! An atomic integer bound to a key, built on WATCH/MULTI/EXEC.
//!
//! Every read-modify-write runs as an optimistic transaction: WATCH the
//! key, read it, queue the write, EXEC. A nil EXEC reply means another
//! writer touched the key in the window; the compare-and-set reports that
//! as `false`, the arithmetic helpers retry until they win. A missing key
//! counts as zero.

use bytes::Bytes;
use tracing::{debug, instrument};

use crate::clients::Endpoint;
use crate::pool::Pool;
use crate::{Error, Result};

pub struct AtomicCounter {
    pool: Pool,
    endpoint: Endpoint,
    key: String,
}

impl AtomicCounter {
    pub fn new(pool: Pool, endpoint: Endpoint, key: impl Into<String>) -> AtomicCounter {
        AtomicCounter {
            pool,
            endpoint,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The current value; zero when the key is missing.
    pub async fn get(&self) -> Result<i64> {
        let mut client = self.pool.lease(&self.endpoint).await?;
        let raw = client.get(&self.key).await?;
        parse_value(raw.as_deref())
    }

    pub async fn set(&self, value: i64) -> Result<()> {
        let mut client = self.pool.lease(&self.endpoint).await?;
        client.set(&self.key, Bytes::from(value.to_string())).await
    }

    /// Sets the counter to `update` only when it currently holds
    /// `expect`.
    ///
    /// One attempt, no retry: `false` means either the value differed or
    /// a concurrent writer aborted the transaction.
    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn compare_and_set(&self, expect: i64, update: i64) -> Result<bool> {
        let mut client = self.pool.lease(&self.endpoint).await?;

        client.watch(&[self.key.as_str()]).await?;
        let current = parse_value(client.get(&self.key).await?.as_deref())?;
        if current != expect {
            // Leave no watch behind; the client stays poolable.
            client.unwatch().await?;
            return Ok(false);
        }

        client.multi().await?;
        client
            .set(&self.key, Bytes::from(update.to_string()))
            .await?;
        let results = client.exec().await?;
        Ok(!results.is_empty())
    }

    /// Adds `delta` and returns the *previous* value, atomically.
    pub async fn get_and_add(&self, delta: i64) -> Result<i64> {
        let mut client = self.pool.lease(&self.endpoint).await?;

        loop {
            client.watch(&[self.key.as_str()]).await?;
            let previous = parse_value(client.get(&self.key).await?.as_deref())?;

            client.multi().await?;
            client
                .set(&self.key, Bytes::from((previous + delta).to_string()))
                .await?;
            if !client.exec().await?.is_empty() {
                return Ok(previous);
            }
            // The watched key changed underneath us; take another turn.
            debug!(key = %self.key, "counter transaction aborted, retrying");
        }
    }

    pub async fn get_and_increment(&self) -> Result<i64> {
        self.get_and_add(1).await
    }

    pub async fn increment_and_get(&self) -> Result<i64> {
        Ok(self.get_and_add(1).await? + 1)
    }

    pub async fn decrement_and_get(&self) -> Result<i64> {
        Ok(self.get_and_add(-1).await? - 1)
    }
}

fn parse_value(raw: Option<&[u8]>) -> Result<i64> {
    match raw {
        None => Ok(0),
        Some(raw) => atoi::atoi::<i64>(raw)
            .ok_or_else(|| Error::protocol("counter key does not hold an integer")),
    }
}
