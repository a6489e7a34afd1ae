use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rejected input, message is safe to show to the caller
    #[error("{0}")]
    Validation(String),

    #[error("comment {0} not found")]
    CommentNotFound(i64),

    #[error("store is closed")]
    Closed,
}

impl StoreError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
