//! Start a review session for one file

use crate::client::ServerClient;
use crate::config::Settings;
use crate::{daemon, util};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

const STARTUP_WAIT: Duration = Duration::from_secs(5);

pub async fn run(settings: &Settings, file: &str, project: Option<&Path>) -> Result<()> {
    let project_dir = util::resolve_project_dir(project)?;
    let file = util::clean_file_arg(file);

    // 1. Make sure a server is up
    if daemon::running_pid(settings).is_none() {
        let spawned = daemon::spawn(settings).context("Failed to start server")?;
        println!("{}", format!("Started server (PID {})", spawned.pid).dimmed());

        let client = ServerClient::new(settings.base_url())?;
        if !client.wait_ready(STARTUP_WAIT).await {
            warn!(log = %spawned.log_file.display(), "Server is not answering yet");
        }
    }

    // 2. Register the project
    let store = super::open_store(settings)?;
    store
        .register_project(&project_dir)
        .context("Failed to register project")?;

    // 3. Hand the URL to the user
    let url = util::review_url(settings.port, &project_dir, file);
    println!("Open this URL in your browser to start reviewing {}:\n\n{}", file, url);
    Ok(())
}
