//! Server process lifecycle: detach, stop, probe

use crate::config::Settings;
use crate::pidfile::{PidFile, PidState};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Hidden flag the detached child is started with
pub const DAEMON_CHILD_FLAG: &str = "--daemon-child";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("server is already running (PID {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("server is not running")]
    NotRunning,

    #[error("server is not running (invalid PID file {}: {contents:?})", path.display())]
    InvalidPidFile { path: PathBuf, contents: String },

    #[error("failed to signal server (PID {pid}): {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::Error,
    },

    #[error("failed to spawn server: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A freshly detached server
#[derive(Debug, Clone)]
pub struct Spawned {
    pub pid: u32,
    pub pid_file: PathBuf,
    pub log_file: PathBuf,
}

/// Fail if a live server owns the PID file; clear it otherwise
pub fn ensure_not_running(pid_file: &PidFile) -> Result<(), LifecycleError> {
    match pid_file.read()? {
        PidState::Missing => Ok(()),
        PidState::Running(pid) => Err(LifecycleError::AlreadyRunning { pid }),
        PidState::Stale(pid) => {
            warn!(pid, path = %pid_file.path().display(), "Removing stale PID file");
            pid_file.remove()?;
            Ok(())
        }
        PidState::Invalid(contents) => {
            warn!(contents = %contents, path = %pid_file.path().display(), "Removing invalid PID file");
            pid_file.remove()?;
            Ok(())
        }
    }
}

/// PID of the live server, if any
pub fn running_pid(settings: &Settings) -> Option<u32> {
    match PidFile::new(settings.pid_file()).read() {
        Ok(PidState::Running(pid)) => Some(pid),
        _ => None,
    }
}

/// Start the server detached from this terminal
///
/// Returns as soon as the child exists; it does not wait for the port.
pub fn spawn(settings: &Settings) -> Result<Spawned, LifecycleError> {
    let pid_file = PidFile::new(settings.pid_file());
    ensure_not_running(&pid_file)?;

    std::fs::create_dir_all(&settings.data_dir)?;
    let log_file = settings.log_file();
    let log = OpenOptions::new().create(true).append(true).open(&log_file)?;

    let exe = std::env::current_exe().map_err(LifecycleError::Spawn)?;

    let mut command = Command::new(exe);
    command
        .arg("server")
        .arg(DAEMON_CHILD_FLAG)
        .env("REDLINE_DATA_DIR", &settings.data_dir)
        .stdin(Stdio::null())
        .stdout(log.try_clone()?)
        .stderr(log);

    // SAFETY: setsid is async-signal-safe and touches no parent state
    unsafe {
        command.pre_exec(|| nix::unistd::setsid().map(drop).map_err(io::Error::from));
    }

    let child = command.spawn().map_err(LifecycleError::Spawn)?;
    let pid = child.id();

    // Record the child right away so a second start sees it; the child
    // rewrites the same PID when it takes the lock.
    std::fs::write(pid_file.path(), pid.to_string())?;

    info!(pid, "Server detached");
    Ok(Spawned {
        pid,
        pid_file: settings.pid_file(),
        log_file,
    })
}

/// Ask the running server to shut down
///
/// Returns once SIGTERM is sent; does not wait for the exit.
pub fn stop(settings: &Settings) -> Result<u32, LifecycleError> {
    let pid_file = PidFile::new(settings.pid_file());

    match pid_file.read()? {
        PidState::Missing => Err(LifecycleError::NotRunning),
        PidState::Stale(pid) => {
            debug!(pid, "Removing stale PID file");
            pid_file.remove()?;
            Err(LifecycleError::NotRunning)
        }
        PidState::Invalid(contents) => {
            pid_file.remove()?;
            Err(LifecycleError::InvalidPidFile {
                path: settings.pid_file(),
                contents,
            })
        }
        PidState::Running(pid) => {
            let raw = i32::try_from(pid).map_err(|_| LifecycleError::NotRunning)?;
            kill(Pid::from_raw(raw), Signal::SIGTERM)
                .map_err(|source| LifecycleError::Signal { pid, source })?;
            info!(pid, "Sent SIGTERM");
            Ok(pid)
        }
    }
}
