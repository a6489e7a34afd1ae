//! SQLite-backed store

use crate::error::{Result, StoreError};
use crate::model::{Comment, NewComment, Project, DEFAULT_AUTHOR};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    directory TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_directory TEXT NOT NULL,
    file_path TEXT NOT NULL,
    line_start INTEGER,
    line_end INTEGER,
    selected_text TEXT NOT NULL DEFAULT '',
    comment_text TEXT NOT NULL,
    author TEXT NOT NULL DEFAULT 'user',
    root_id INTEGER REFERENCES comments(id) ON DELETE CASCADE,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolved_by TEXT,
    resolved_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_file ON comments(project_directory, file_path);
CREATE INDEX IF NOT EXISTS idx_comments_root ON comments(root_id);
";

/// Handle on the review database
///
/// The connection sits behind a mutex so one `Store` can be shared across
/// request handlers. After [`Store::close`] every call fails with
/// [`StoreError::Closed`].
pub struct Store {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl Store {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;

        debug!(path = %path.display(), journal_mode = %mode, "store opened");

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// Register a project directory; registering twice is a no-op
    pub fn register_project(&self, directory: &str) -> Result<Project> {
        if directory.is_empty() {
            return Err(StoreError::invalid("project directory is required"));
        }

        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO projects (directory, created_at) VALUES (?1, ?2)",
                params![directory, Utc::now()],
            )?;
            if inserted > 0 {
                info!(directory, "project registered");
            }

            let project = conn.query_row(
                &format!("SELECT {} FROM projects WHERE directory = ?1", Project::COLUMNS),
                params![directory],
                Project::from_row,
            )?;
            Ok(project)
        })
    }

    /// Every registered project, oldest first
    pub fn projects(&self) -> Result<Vec<Project>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM projects ORDER BY id",
                Project::COLUMNS
            ))?;
            let projects = stmt
                .query_map([], Project::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    /// Validate and insert a comment or reply
    pub fn add_comment(&self, new: NewComment) -> Result<Comment> {
        validate(&new)?;

        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            if let Some(root_id) = new.root_id {
                let root = tx
                    .query_row(
                        "SELECT root_id FROM comments WHERE id = ?1",
                        params![root_id],
                        |row| row.get::<_, Option<i64>>(0),
                    )
                    .optional()?;

                match root {
                    None => return Err(StoreError::CommentNotFound(root_id)),
                    Some(Some(_)) => {
                        return Err(StoreError::invalid(
                            "can only reply to root comments, not to replies",
                        ))
                    }
                    Some(None) => {}
                }
            }

            let author = new
                .author
                .as_deref()
                .filter(|a| !a.is_empty())
                .unwrap_or(DEFAULT_AUTHOR);

            tx.execute(
                "INSERT INTO comments (project_directory, file_path, line_start, line_end, \
                 selected_text, comment_text, author, root_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    new.project_directory,
                    new.file_path,
                    new.line_start,
                    new.line_end,
                    new.selected_text,
                    new.comment_text,
                    author,
                    new.root_id,
                    Utc::now(),
                ],
            )?;
            let id = tx.last_insert_rowid();

            let comment = tx.query_row(
                &format!("SELECT {} FROM comments WHERE id = ?1", Comment::COLUMNS),
                params![id],
                Comment::from_row,
            )?;
            tx.commit()?;

            debug!(id, file = %comment.file_path, root = ?comment.root_id, "comment added");
            Ok(comment)
        })
    }

    pub fn comment(&self, id: i64) -> Result<Option<Comment>> {
        self.with_conn(|conn| {
            let comment = conn
                .query_row(
                    &format!("SELECT {} FROM comments WHERE id = ?1", Comment::COLUMNS),
                    params![id],
                    Comment::from_row,
                )
                .optional()?;
            Ok(comment)
        })
    }

    /// Comments on one file in creation order
    pub fn comments(
        &self,
        project_directory: &str,
        file_path: &str,
        include_resolved: bool,
    ) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM comments \
                 WHERE project_directory = ?1 AND file_path = ?2 AND (?3 OR resolved = 0) \
                 ORDER BY id",
                Comment::COLUMNS
            ))?;
            let comments = stmt
                .query_map(
                    params![project_directory, file_path, include_resolved],
                    Comment::from_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }

    /// Resolve every open comment on a file, returning how many changed
    pub fn resolve_file(
        &self,
        project_directory: &str,
        file_path: &str,
        resolved_by: &str,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let count = conn.execute(
                "UPDATE comments SET resolved = 1, resolved_by = ?3, resolved_at = ?4 \
                 WHERE project_directory = ?1 AND file_path = ?2 AND resolved = 0",
                params![project_directory, file_path, resolved_by, Utc::now()],
            )?;
            info!(project_directory, file_path, count, "resolved file comments");
            Ok(count)
        })
    }

    /// Resolve a root comment and its replies, returning how many changed
    pub fn resolve_thread(&self, root_id: i64, resolved_by: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let count = conn.execute(
                "UPDATE comments SET resolved = 1, resolved_by = ?2, resolved_at = ?3 \
                 WHERE (id = ?1 OR root_id = ?1) AND resolved = 0",
                params![root_id, resolved_by, Utc::now()],
            )?;
            info!(root_id, count, "resolved thread");
            Ok(count)
        })
    }

    pub fn has_replies(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM comments WHERE root_id = ?1 LIMIT 1",
                    params![id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Replace the text of a comment nobody has replied to yet
    pub fn update_comment(&self, id: i64, comment_text: &str) -> Result<Comment> {
        if comment_text.is_empty() {
            return Err(StoreError::invalid("comment_text is required"));
        }

        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            let replied = tx
                .query_row(
                    "SELECT 1 FROM comments WHERE root_id = ?1 LIMIT 1",
                    params![id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if replied {
                return Err(StoreError::invalid("Cannot edit comment with replies"));
            }

            let changed = tx.execute(
                "UPDATE comments SET comment_text = ?2 WHERE id = ?1",
                params![id, comment_text],
            )?;
            if changed == 0 {
                return Err(StoreError::CommentNotFound(id));
            }

            let comment = tx.query_row(
                &format!("SELECT {} FROM comments WHERE id = ?1", Comment::COLUMNS),
                params![id],
                Comment::from_row,
            )?;
            tx.commit()?;

            debug!(id, "comment updated");
            Ok(comment)
        })
    }

    /// Delete a comment; deleting a root takes its replies with it
    ///
    /// Returns how many rows went away. Unknown ids delete nothing.
    pub fn delete_comment(&self, id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let replies = tx.execute("DELETE FROM comments WHERE root_id = ?1", params![id])?;
            let removed = tx.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
            tx.commit()?;

            let count = replies + removed;
            info!(id, count, "comment deleted");
            Ok(count)
        })
    }

    /// Checkpoint the WAL and close the connection
    ///
    /// Idempotent.
    pub fn close(&self) -> Result<()> {
        let Some(conn) = self.conn.lock().take() else {
            return Ok(());
        };

        if let Err(err) = conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(())) {
            warn!(error = %err, "WAL checkpoint failed");
        }
        conn.close().map_err(|(_, err)| err)?;

        info!(path = %self.path.display(), "store closed");
        Ok(())
    }
}

fn validate(new: &NewComment) -> Result<()> {
    if new.project_directory.is_empty() {
        return Err(StoreError::invalid("project_directory is required"));
    }
    if new.file_path.is_empty() {
        return Err(StoreError::invalid("file_path is required"));
    }

    if new.root_id.is_none() {
        let start = new.line_start.filter(|&n| n > 0);
        let end = new.line_end.filter(|&n| n > 0);

        let Some(start) = start else {
            return Err(StoreError::invalid("line_start must be positive"));
        };
        let Some(end) = end else {
            return Err(StoreError::invalid("line_end must be positive"));
        };
        if end < start {
            return Err(StoreError::invalid("line_end must be >= line_start"));
        }
        if new.selected_text.is_empty() {
            return Err(StoreError::invalid(
                "selected_text is required for root comments",
            ));
        }
    }

    if new.comment_text.is_empty() {
        return Err(StoreError::invalid("comment_text is required"));
    }

    Ok(())
}
