//! Watch setup errors
//!
//! None of these are fatal to the server. The registry logs them and keeps an
//! inactive handle so reference counting stays consistent.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("no read permission for {}", .0.display())]
    Unreadable(PathBuf),

    #[error("path {} has no parent directory", .0.display())]
    NoParent(PathBuf),

    #[error("file watching needs a running tokio runtime")]
    NoRuntime,

    #[error("filesystem watch failed: {0}")]
    Notify(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, WatchError>;
