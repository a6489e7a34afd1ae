//! Start the server

use crate::config::Settings;
use crate::{daemon, server};
use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run(settings: &Settings, detach: bool, daemon_child: bool) -> Result<()> {
    if detach {
        start_background(settings)
    } else {
        // Foreground, or the detached child doing the real work
        server::run(settings, daemon_child).await
    }
}

fn start_background(settings: &Settings) -> Result<()> {
    let spawned = daemon::spawn(settings)?;

    println!("{} Server started as daemon (PID {})", "✓".green(), spawned.pid);
    println!("PID file: {}", spawned.pid_file.display());
    println!("Log file: {}", spawned.log_file.display());
    Ok(())
}
