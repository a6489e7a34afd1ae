//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Resolve `--project`, defaulting to the current directory
///
/// Relative paths are taken from the current directory; the result is
/// always absolute so topics from the CLI and the browser line up.
pub fn resolve_project_dir(project: Option<&Path>) -> Result<String> {
    let dir = match project {
        Some(path) if !path.as_os_str().is_empty() && path != Path::new(".") => {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                current_dir()?.join(path)
            }
        }
        _ => current_dir()?,
    };

    Ok(dir.to_string_lossy().into_owned())
}

fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to get current directory")
}

/// Strip the `@` some editors put in front of file references
pub fn clean_file_arg(file: &str) -> &str {
    file.strip_prefix('@').unwrap_or(file)
}

/// Percent-escape each component of a path, keeping the slashes
pub fn escape_path_components(path: &str) -> String {
    path.split('/')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Viewer URL for one file of a project
pub fn review_url(port: u16, project_dir: &str, file: &str) -> String {
    format!(
        "http://localhost:{}/projects{}/{}",
        port,
        escape_path_components(project_dir),
        escape_path_components(file)
    )
}

pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
