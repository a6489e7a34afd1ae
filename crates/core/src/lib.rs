//! Shared vocabulary for redline
//!
//! This crate provides:
//! - `Topic`: the `(project_directory, file_path)` key that scopes
//!   subscriptions and broadcasts
//! - `Event`: a named JSON payload delivered to browser connections
//! - Lexical path normalization used to map topics onto watched files

pub mod event;
pub mod topic;

// Re-exports
pub use event::{Event, COMMENTS_RESOLVED, CONNECTED, FILE_UPDATED, RELOAD};
pub use topic::{normalize_path, Topic};
