//! Rows and request types

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default author for comments created without one
pub const DEFAULT_AUTHOR: &str = "user";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub directory: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub(crate) const COLUMNS: &'static str = "id, directory, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            directory: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

/// A review comment anchored to a line range, or a reply in its thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub project_directory: String,
    pub file_path: String,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub selected_text: String,
    pub comment_text: String,
    pub author: String,
    /// Set on replies; points at the thread's root comment
    pub root_id: Option<i64>,
    pub resolved: bool,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub(crate) const COLUMNS: &'static str = "id, project_directory, file_path, line_start, \
         line_end, selected_text, comment_text, author, root_id, resolved, resolved_by, \
         resolved_at, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_directory: row.get(1)?,
            file_path: row.get(2)?,
            line_start: row.get(3)?,
            line_end: row.get(4)?,
            selected_text: row.get(5)?,
            comment_text: row.get(6)?,
            author: row.get(7)?,
            root_id: row.get(8)?,
            resolved: row.get(9)?,
            resolved_by: row.get(10)?,
            resolved_at: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    pub fn is_root(&self) -> bool {
        self.root_id.is_none()
    }

    /// Id of the thread this comment belongs to
    pub fn thread_id(&self) -> i64 {
        self.root_id.unwrap_or(self.id)
    }
}

/// Fields accepted when creating a comment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewComment {
    pub project_directory: String,
    pub file_path: String,
    pub line_start: Option<i64>,
    pub line_end: Option<i64>,
    pub selected_text: String,
    pub comment_text: String,
    pub author: Option<String>,
    pub root_id: Option<i64>,
}

impl NewComment {
    /// A reply to `root`, addressed to the same file
    pub fn reply(root: &Comment, author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            project_directory: root.project_directory.clone(),
            file_path: root.file_path.clone(),
            comment_text: text.into(),
            author: Some(author.into()),
            root_id: Some(root.id),
            ..Self::default()
        }
    }
}

/// Group comments into threads, root first, in order of first appearance
pub fn group_threads(comments: &[Comment]) -> Vec<Vec<Comment>> {
    let mut order = Vec::new();
    let mut threads: HashMap<i64, Vec<Comment>> = HashMap::new();

    for comment in comments {
        let key = comment.thread_id();
        let thread = threads.entry(key).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });

        if comment.is_root() {
            thread.insert(0, comment.clone());
        } else {
            thread.push(comment.clone());
        }
    }

    order
        .into_iter()
        .filter_map(|key| threads.remove(&key))
        .collect()
}
