//! Server administration commands.

use bytes::Bytes;

use crate::clients::Client;
use crate::cmd::Command;
use crate::value::{expect_data, expect_int, expect_ok, expect_string, expect_string_pairs};
use crate::{Error, Result};

impl Client {
    /// Liveness probe: replies `PONG`, or echoes `msg` when given.
    pub async fn ping(&mut self, msg: Option<Bytes>) -> Result<Bytes> {
        let mut cmd = Command::new("PING");
        if let Some(msg) = msg {
            cmd = cmd.arg(msg);
        }
        self.dispatch_map(cmd, expect_data).await
    }

    pub async fn echo(&mut self, msg: Bytes) -> Result<Bytes> {
        self.dispatch_map(Command::new("ECHO").arg(msg), expect_data)
            .await
    }

    /// Switch this connection to another database index.
    ///
    /// A connection SELECTed away from its endpoint's database is not
    /// returned to the pool.
    pub async fn select(&mut self, database: u32) -> Result<()> {
        self.dispatch_map(Command::new("SELECT").arg(database), expect_ok)
            .await?;
        self.note_selected(database);
        Ok(())
    }

    /// The server's info report, optionally narrowed to one section.
    pub async fn info(&mut self, section: Option<&str>) -> Result<String> {
        let mut cmd = Command::new("INFO");
        if let Some(section) = section {
            cmd = cmd.arg(section);
        }
        self.dispatch_map(cmd, expect_string).await
    }

    /// Number of keys in the current database.
    pub async fn dbsize(&mut self) -> Result<i64> {
        self.dispatch_map(Command::new("DBSIZE"), expect_int).await
    }

    /// Remove every key of the current database.
    pub async fn flushdb(&mut self) -> Result<()> {
        self.dispatch_map(Command::new("FLUSHDB"), expect_ok).await
    }

    /// Remove every key of every database.
    pub async fn flushall(&mut self) -> Result<()> {
        self.dispatch_map(Command::new("FLUSHALL"), expect_ok).await
    }

    /// Synchronous snapshot to disk.
    pub async fn save(&mut self) -> Result<()> {
        self.dispatch_map(Command::new("SAVE"), expect_ok).await
    }

    /// Background snapshot; the reply only acknowledges the fork.
    pub async fn bgsave(&mut self) -> Result<()> {
        self.dispatch_map(Command::new("BGSAVE"), |frame| match frame {
            crate::frame::Frame::Simple(_) => Ok(()),
            frame => Err(Error::protocol(format!(
                "unexpected BGSAVE reply {frame:?}"
            ))),
        })
        .await
    }

    pub async fn bgrewriteaof(&mut self) -> Result<()> {
        self.dispatch_map(Command::new("BGREWRITEAOF"), |frame| match frame {
            crate::frame::Frame::Simple(_) => Ok(()),
            frame => Err(Error::protocol(format!(
                "unexpected BGREWRITEAOF reply {frame:?}"
            ))),
        })
        .await
    }

    /// Unix timestamp of the last successful save.
    pub async fn lastsave(&mut self) -> Result<i64> {
        self.dispatch_map(Command::new("LASTSAVE"), expect_int)
            .await
    }

    /// Configuration entries matching the glob `pattern`.
    pub async fn config_get(&mut self, pattern: &str) -> Result<Vec<(String, String)>> {
        self.dispatch_map(
            Command::new("CONFIG").arg("GET").arg(pattern),
            expect_string_pairs,
        )
        .await
    }

    pub async fn config_set(&mut self, parameter: &str, value: &str) -> Result<()> {
        self.dispatch_map(
            Command::new("CONFIG").arg("SET").arg(parameter).arg(value),
            expect_ok,
        )
        .await
    }

    pub async fn config_resetstat(&mut self) -> Result<()> {
        self.dispatch_map(Command::new("CONFIG").arg("RESETSTAT"), expect_ok)
            .await
    }

    /// Ask the server to persist and exit. The server drops the
    /// connection instead of replying, so the resulting EOF counts as
    /// success and the client ends up closed.
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.dispatch(Command::new("SHUTDOWN")).await {
            Err(Error::ConnectionLost(_)) | Ok(_) => {
                self.close().await;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
