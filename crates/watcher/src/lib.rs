//! File watching for redline
//!
//! This crate provides:
//! - `WatchRegistry`: one reference-counted watch per absolute path,
//!   acquired and released as topics gain and lose subscribers
//! - A single shared OS watcher with one watch per directory, however many
//!   files in it are followed
//! - Per-path debouncing (100ms trailing window, capped at 1s)
//! - Tolerance for files that do not exist yet, unreadable files and
//!   directories that disappear while watched

pub mod debounce;
pub mod error;
mod handle;
pub mod registry;
mod shared;
mod watch;

pub use error::WatchError;
pub use registry::WatchRegistry;

use std::time::Duration;

/// Timing knobs for change coalescing
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Quiet period that ends a burst of changes
    pub debounce: Duration,
    /// Upper bound between the first change of a burst and its publish
    pub max_delay: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        }
    }
}
