//! CLI command implementations

pub mod address;
pub mod register;
pub mod reply;
pub mod resolve;
pub mod review;
pub mod start;
pub mod status;
pub mod stop;

use crate::config::Settings;
use anyhow::{Context, Result};
use redline_store::Store;

/// Open the shared database for a short-lived command
pub(crate) fn open_store(settings: &Settings) -> Result<Store> {
    Store::open(&settings.database_path())
        .with_context(|| format!("Failed to open database {}", settings.database_path().display()))
}
