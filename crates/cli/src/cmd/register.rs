//! Register a project directory

use crate::config::Settings;
use crate::util;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run(settings: &Settings, project: Option<&Path>) -> Result<()> {
    let project_dir = util::resolve_project_dir(project)?;

    let store = super::open_store(settings)?;
    store
        .register_project(&project_dir)
        .context("Failed to register project")?;

    println!("Registered project: {}", project_dir);
    Ok(())
}
