//! Running the `redline` binary from tests
//!
//! Every invocation is isolated through environment variables; nothing is
//! read from the developer's real data directory.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Path of the `redline` binary built for this test run
pub fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_redline"))
}

/// One pending `redline` invocation
pub struct RlCommand {
    inner: Command,
    argv: Vec<String>,
}

impl RlCommand {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        let mut inner = Command::new(binary_path());
        inner
            .current_dir(cwd.as_ref())
            .env_remove("RUST_LOG")
            .stdin(Stdio::null());

        Self {
            inner,
            argv: Vec::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        for arg in args {
            self.inner.arg(arg);
            self.argv.push((*arg).to_owned());
        }
        self
    }

    pub fn env(&mut self, key: &str, value: impl AsRef<OsStr>) -> &mut Self {
        self.inner.env(key, value);
        self
    }

    /// Run to completion and capture both streams
    pub fn execute(&mut self) -> Result<CliOutput> {
        let output = self
            .inner
            .output()
            .with_context(|| format!("Failed to run redline {:?}", self.argv))?;

        Ok(CliOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            code: output.status.code(),
        })
    }

    pub fn assert_success(&mut self) -> Result<CliOutput> {
        let out = self.execute()?;
        anyhow::ensure!(
            out.success(),
            "redline {:?} exited with {:?}\n--- stdout\n{}--- stderr\n{}",
            self.argv,
            out.code,
            out.stdout,
            out.stderr
        );
        Ok(out)
    }

    pub fn assert_failure(&mut self) -> Result<CliOutput> {
        let out = self.execute()?;
        anyhow::ensure!(
            !out.success(),
            "redline {:?} was expected to fail\n--- stdout\n{}",
            self.argv,
            out.stdout
        );
        Ok(out)
    }
}

/// Captured result of one invocation
#[derive(Debug)]
pub struct CliOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when killed by a signal
    pub code: Option<i32>,
}

impl CliOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Both streams, stdout first
    pub fn output(&self) -> String {
        [self.stdout.as_str(), self.stderr.as_str()].concat()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.stdout.contains(needle) || self.stderr.contains(needle)
    }

    /// PID printed as `(PID n)`
    pub fn parse_pid(&self) -> Option<u32> {
        extract_pid(&self.output())
    }
}

pub fn extract_pid(text: &str) -> Option<u32> {
    let (_, rest) = text.split_once("(PID ")?;
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// `rl!(env, "server", "--status")` builds a command in `env`'s project
#[macro_export]
macro_rules! rl {
    ($env:expr, $($arg:expr),+ $(,)?) => {{
        let mut cmd = $env.command();
        cmd.args(&[$($arg),+]);
        cmd
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_extraction() {
        assert_eq!(extract_pid("✓ Server started as daemon (PID 4242)\n"), Some(4242));
        assert_eq!(extract_pid("Sent SIGTERM to server (PID 17)"), Some(17));
        assert_eq!(extract_pid("Server is not running"), None);
    }
}
