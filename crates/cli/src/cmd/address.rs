//! Print open review threads for one file

use crate::config::Settings;
use crate::util;
use anyhow::{Context, Result};
use redline_store::{group_threads, Comment};
use std::path::Path;
use tracing::debug;

pub async fn run(settings: &Settings, file: &str, project: Option<&Path>) -> Result<()> {
    let project_dir = util::resolve_project_dir(project)?;
    let file = util::clean_file_arg(file);

    let store = super::open_store(settings)?;
    debug!(project_directory = %project_dir, file_path = %file, "Searching for comments");
    let comments = store
        .comments(&project_dir, file, false)
        .context("Failed to get comments")?;

    if comments.is_empty() {
        println!("No unresolved comments for {}", file);
        return Ok(());
    }

    let threads = group_threads(&comments);
    println!("Found {} unresolved comment(s) for {}:\n", threads.len(), file);

    for (index, thread) in threads.iter().enumerate() {
        print_thread(thread);
        if index + 1 < threads.len() {
            println!("\n---\n");
        }
    }

    Ok(())
}

fn print_thread(thread: &[Comment]) {
    let Some((root, replies)) = thread.split_first() else {
        return;
    };

    let lines = match (root.line_start, root.line_end) {
        (Some(start), Some(end)) => format!(" (lines {}-{})", start, end),
        _ => String::new(),
    };
    println!("## Comment #{}{}", root.id, lines);

    if !root.selected_text.is_empty() {
        for line in root.selected_text.lines() {
            println!("> {}", line);
        }
        println!();
    }

    println!("**{}:**", util::capitalize_first(&root.author));
    println!("{}", root.comment_text);

    if !replies.is_empty() {
        println!();
        for reply in replies {
            println!("\n**Reply from {}:**", util::capitalize_first(&reply.author));
            println!("{}", reply.comment_text);
        }
    }
}
