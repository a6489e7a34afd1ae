//! Subscription topics

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Key that scopes subscriptions and broadcasts
///
/// Two topics are equal only when both fields are byte-identical. No
/// normalization is applied for matching; `./test.md` and `test.md` are
/// different topics even though they resolve to the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Topic {
    /// Absolute project directory
    pub project_directory: String,
    /// File path relative to `project_directory`
    pub file_path: String,
}

impl Topic {
    pub fn new(project_directory: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            project_directory: project_directory.into(),
            file_path: file_path.into(),
        }
    }

    /// Absolute path of the file this topic refers to
    ///
    /// Lexically normalized so that topics spelling the same file differently
    /// map onto the same watch.
    pub fn absolute_path(&self) -> PathBuf {
        normalize_path(&Path::new(&self.project_directory).join(&self.file_path))
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.project_directory, self.file_path)
    }
}

/// Normalize a path without touching the filesystem
///
/// Drops `.` components and folds `..` into the preceding component. The
/// file does not need to exist.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // Never climb above the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    out
}
