//! Stop the detached server

use crate::config::Settings;
use crate::daemon;
use anyhow::Result;

pub async fn run(settings: &Settings) -> Result<()> {
    let pid = daemon::stop(settings)?;
    println!("Sent SIGTERM to server (PID {})", pid);
    Ok(())
}
