//! Persistent projects and review comments
//!
//! A single SQLite file in WAL mode, shared by the long-running server and
//! short-lived CLI commands. Every handle sets a busy timeout so concurrent
//! writers wait for each other instead of failing.

pub mod error;
pub mod model;
pub mod store;

pub use error::{Result, StoreError};
pub use model::{group_threads, Comment, NewComment, Project};
pub use store::Store;
