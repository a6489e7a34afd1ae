//! Resolve review comments

use crate::config::Settings;
use crate::{client, util};
use anyhow::{Context, Result};
use redline_core::{Topic, COMMENTS_RESOLVED};
use std::path::Path;
use tracing::debug;

/// Who resolves from the command line
const RESOLVER: &str = "user";

pub async fn run(
    settings: &Settings,
    project: Option<&Path>,
    file: Option<&str>,
    comment_id: Option<i64>,
) -> Result<()> {
    match comment_id {
        Some(id) => resolve_thread(settings, id).await,
        None => {
            let file = file.context("--file is required (or use --comment-id)")?;
            resolve_file(settings, project, util::clean_file_arg(file)).await
        }
    }
}

async fn resolve_thread(settings: &Settings, comment_id: i64) -> Result<()> {
    let store = super::open_store(settings)?;
    let comment = store
        .comment(comment_id)
        .context("Failed to get comment")?
        .with_context(|| format!("comment {} not found", comment_id))?;

    let root_id = comment.thread_id();
    let count = store
        .resolve_thread(root_id, RESOLVER)
        .context("Failed to resolve thread")?;

    if count == 0 {
        println!("Thread {} was already resolved", root_id);
        return Ok(());
    }

    println!("Resolved thread {} ({} comment(s))", root_id, count);
    let topic = Topic::new(comment.project_directory, comment.file_path);
    client::notify(&settings.base_url(), &topic, COMMENTS_RESOLVED).await;
    Ok(())
}

async fn resolve_file(settings: &Settings, project: Option<&Path>, file: &str) -> Result<()> {
    let project_dir = util::resolve_project_dir(project)?;
    let store = super::open_store(settings)?;

    debug!(project_directory = %project_dir, file_path = %file, "Resolving comments");
    let count = store
        .resolve_file(&project_dir, file, RESOLVER)
        .context("Failed to resolve comments")?;

    if count == 0 {
        println!("No unresolved comments found for {}", file);
        return Ok(());
    }

    println!("Resolved {} comment(s) for {}", count, file);
    let topic = Topic::new(project_dir, file);
    client::notify(&settings.base_url(), &topic, COMMENTS_RESOLVED).await;
    Ok(())
}
