//! Reply to a review thread as the agent

use crate::client;
use crate::config::Settings;
use anyhow::{Context, Result};
use redline_core::{Topic, RELOAD};
use redline_store::NewComment;

const AGENT: &str = "agent";

pub async fn run(settings: &Settings, comment_id: i64, message: &str) -> Result<()> {
    if message.is_empty() {
        anyhow::bail!("--message must not be empty");
    }

    let store = super::open_store(settings)?;
    let parent = store
        .comment(comment_id)
        .context("Failed to get comment")?
        .with_context(|| format!("comment {} not found", comment_id))?;

    if !parent.is_root() {
        anyhow::bail!("can only reply to root comments, not to replies");
    }

    store
        .add_comment(NewComment::reply(&parent, AGENT, message))
        .context("Failed to create reply")?;
    println!("Reply added to comment {}", comment_id);

    let topic = Topic::new(parent.project_directory, parent.file_path);
    client::notify(&settings.base_url(), &topic, RELOAD).await;
    Ok(())
}
