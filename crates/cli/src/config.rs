//! Layered settings
//!
//! Defaults, then `<data_dir>/config.toml` if present, then `REDLINE_*`
//! environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4779;
/// Ceiling for every configurable timer
pub const MAX_TIMER_MS: u64 = 60 * 60 * 1000;
const DATA_DIR_VAR: &str = "REDLINE_DATA_DIR";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub debounce_ms: u64,
    pub max_delay_ms: u64,
    pub queue_capacity: usize,
    pub shutdown_grace_ms: u64,
}

impl Settings {
    /// Load settings for the current process environment
    pub fn load() -> Result<Self> {
        let data_dir = default_data_dir()?;
        Self::load_from(&data_dir)
    }

    /// Load settings rooted at `data_dir`
    pub fn load_from(data_dir: &Path) -> Result<Self> {
        let config_file = data_dir.join("config.toml");

        let settings = Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("debounce_ms", 100_i64)?
            .set_default("max_delay_ms", 1000_i64)?
            .set_default("queue_capacity", 64_i64)?
            .set_default("shutdown_grace_ms", 3000_i64)?
            .add_source(File::from(config_file.as_path()).required(false))
            .add_source(Environment::with_prefix("REDLINE").try_parsing(true))
            .set_override("data_dir", data_dir.to_string_lossy().into_owned())?
            .build()
            .with_context(|| format!("Failed to load settings from {}", config_file.display()))?;

        settings
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.data_dir.join("server.pid")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("server.log")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("redline.db")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Where local clients reach the server
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn debounce(&self) -> Duration {
        timer(self.debounce_ms)
    }

    pub fn max_delay(&self) -> Duration {
        timer(self.max_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        timer(self.shutdown_grace_ms)
    }
}

fn timer(ms: u64) -> Duration {
    Duration::from_millis(ms.min(MAX_TIMER_MS))
}

/// `REDLINE_DATA_DIR`, else the platform data dir, else `~/.redline`
pub fn default_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_DIR_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    if let Some(dir) = dirs::data_local_dir() {
        return Ok(dir.join("redline"));
    }

    dirs::home_dir()
        .map(|home| home.join(".redline"))
        .context("Could not determine a data directory (set REDLINE_DATA_DIR)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_derived_paths() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(dir.path()).unwrap();

        assert_eq!(settings.data_dir, dir.path());
        assert_eq!(settings.host, "127.0.0.1");
        assert_eq!(settings.debounce(), Duration::from_millis(100));
        assert_eq!(settings.max_delay(), Duration::from_secs(1));
        assert_eq!(settings.pid_file(), dir.path().join("server.pid"));
        assert_eq!(settings.log_file(), dir.path().join("server.log"));
        assert_eq!(settings.database_path(), dir.path().join("redline.db"));
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "debounce_ms = 250\nqueue_capacity = 8\n",
        )
        .unwrap();

        let settings = Settings::load_from(dir.path()).unwrap();
        assert_eq!(settings.debounce_ms, 250);
        assert_eq!(settings.queue_capacity, 8);
        assert_eq!(settings.max_delay_ms, 1000);
    }

    #[test]
    fn test_timers_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "max_delay_ms = 9223372036854775807
shutdown_grace_ms = 500
",
        )
        .unwrap();

        let settings = Settings::load_from(dir.path()).unwrap();
        assert_eq!(settings.max_delay(), Duration::from_millis(MAX_TIMER_MS));
        assert_eq!(settings.shutdown_grace(), Duration::from_millis(500));
    }
}
