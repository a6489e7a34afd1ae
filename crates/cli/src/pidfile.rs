//! PID file management for server exclusivity
//!
//! The file holds the server's PID as decimal text. A running server also
//! keeps an exclusive `flock` on it, so two servers racing to start cannot
//! both claim it.

use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What the PID file currently says
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidState {
    Missing,
    Running(u32),
    /// Names a process that no longer exists
    Stale(u32),
    /// Present but not a PID
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inspect the file and the process it names
    pub fn read(&self) -> io::Result<PidState> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(PidState::Missing),
            Err(err) => return Err(err),
        };

        let trimmed = contents.trim();
        let state = match trimmed.parse::<u32>() {
            Ok(pid) if pid > 0 && is_process_alive(pid) => PidState::Running(pid),
            Ok(pid) if pid > 0 => PidState::Stale(pid),
            _ => PidState::Invalid(trimmed.to_string()),
        };
        Ok(state)
    }

    /// Delete the file; a missing file is not an error
    pub fn remove(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    /// Record the current process as the server
    ///
    /// Fails with `AlreadyExists` if another live process holds the file.
    pub fn claim(&self) -> io::Result<PidGuard> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;

        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {}
            Err(Errno::EWOULDBLOCK) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is held by another server", self.path.display()),
                ));
            }
            Err(err) => return Err(err.into()),
        }

        let pid = std::process::id();
        file.set_len(0)?;
        write!(file, "{pid}")?;
        file.sync_all()?;

        debug!(pid, path = %self.path.display(), "PID file claimed");
        Ok(PidGuard {
            path: self.path.clone(),
            pid,
            _file: file,
        })
    }
}

/// Removes the PID file when dropped, if it still names this process
pub struct PidGuard {
    path: PathBuf,
    pid: u32,
    _file: File,
}

impl PidGuard {
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for PidGuard {
    fn drop(&mut self) {
        let ours = std::fs::read_to_string(&self.path)
            .map(|contents| contents.trim() == self.pid.to_string())
            .unwrap_or(false);

        if ours {
            if let Err(err) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %err, "Failed to remove PID file");
            }
        }
    }
}

/// Check if process is alive
///
/// Signal 0 only checks for existence; EPERM means it exists but belongs to
/// someone else.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };

    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::ESRCH) => false,
        Err(_) => true,
    }
}
