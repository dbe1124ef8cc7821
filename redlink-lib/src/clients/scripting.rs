//! Server-side Lua scripting.

use bytes::Bytes;

use crate::clients::Client;
use crate::cmd::Command;
use crate::value::{expect_bool_vec, expect_ok, expect_string, Value};
use crate::Result;

impl Client {
    /// Evaluate a script. The reply shape depends entirely on the script,
    /// so the result is the generic [`Value`].
    pub async fn eval(&mut self, script: &str, keys: &[&str], args: &[Bytes]) -> Result<Value> {
        let cmd = Command::new("EVAL")
            .arg(script)
            .arg(keys.len())
            .args(keys)
            .args(args);
        self.dispatch_map(cmd, Value::from_frame).await
    }

    /// Evaluate a script cached under its SHA-1 digest.
    pub async fn evalsha(&mut self, sha: &str, keys: &[&str], args: &[Bytes]) -> Result<Value> {
        let cmd = Command::new("EVALSHA")
            .arg(sha)
            .arg(keys.len())
            .args(keys)
            .args(args);
        self.dispatch_map(cmd, Value::from_frame).await
    }

    /// Load a script into the server cache, returning its SHA-1 digest.
    pub async fn script_load(&mut self, script: &str) -> Result<String> {
        self.dispatch_map(
            Command::new("SCRIPT").arg("LOAD").arg(script),
            expect_string,
        )
        .await
    }

    /// One flag per digest, telling whether it is cached.
    pub async fn script_exists(&mut self, shas: &[&str]) -> Result<Vec<bool>> {
        self.dispatch_map(
            Command::new("SCRIPT").arg("EXISTS").args(shas),
            expect_bool_vec,
        )
        .await
    }

    pub async fn script_flush(&mut self) -> Result<()> {
        self.dispatch_map(Command::new("SCRIPT").arg("FLUSH"), expect_ok)
            .await
    }

    /// Kill the currently running script. Rejected inside MULTI: the kill
    /// would only be queued behind the very script it is meant to stop.
    pub async fn script_kill(&mut self) -> Result<()> {
        self.reject_in_transaction("SCRIPT KILL")?;
        self.dispatch_map(Command::new("SCRIPT").arg("KILL"), expect_ok)
            .await
    }
}
