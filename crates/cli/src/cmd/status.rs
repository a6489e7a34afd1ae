//! Show server status

use crate::config::Settings;
use crate::pidfile::{PidFile, PidState};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

/// Print status; returns whether the server is running
pub async fn run(settings: &Settings) -> Result<bool> {
    let pid_file = PidFile::new(settings.pid_file());
    let state = pid_file.read().context("Failed to read PID file")?;

    let pid = match state {
        PidState::Running(pid) => pid,
        PidState::Missing => {
            println!("{}", "Server is not running".yellow());
            return Ok(false);
        }
        PidState::Stale(pid) => {
            pid_file.remove().context("Failed to remove stale PID file")?;
            println!("{}", "Server is not running".yellow());
            println!("  {}", format!("Removed stale PID file (PID {})", pid).dimmed());
            return Ok(false);
        }
        PidState::Invalid(contents) => {
            eprintln!(
                "{} invalid PID file {} ({:?}), removing it",
                "Warning:".yellow(),
                pid_file.path().display(),
                contents
            );
            pid_file.remove().context("Failed to remove invalid PID file")?;
            println!("{}", "Server is not running".yellow());
            return Ok(false);
        }
    };

    println!("{}", "Server is running".green());
    println!("  PID:       {}", pid);
    println!("  Port:      {}", settings.port);
    println!("  PID file:  {}", pid_file.path().display());
    println!("  Log file:  {}", settings.log_file().display());
    Ok(true)
}
