//! Tracing setup for the different process roles

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// How much a process should say, and where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Short-lived commands: warnings only, to stderr
    Command,
    /// A server attached to the terminal
    Foreground,
    /// The detached daemon, writing into the data dir's log file
    Daemon,
}

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the global subscriber
///
/// The returned guard must be held until exit so buffered daemon log lines
/// are flushed.
pub fn init(target: LogTarget, log_file: &Path) -> Result<Option<WorkerGuard>> {
    match target {
        LogTarget::Command => {
            tracing_subscriber::fmt()
                .with_env_filter(filter("warn"))
                .with_writer(std::io::stderr)
                .without_time()
                .init();
            Ok(None)
        }
        LogTarget::Foreground => {
            tracing_subscriber::fmt()
                .with_env_filter(filter("info"))
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
        LogTarget::Daemon => {
            let dir = log_file.parent().context("Log file has no parent directory")?;
            let name = log_file.file_name().context("Log file has no name")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter("info"))
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
    }
}
