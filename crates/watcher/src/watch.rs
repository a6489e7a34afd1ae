//! Watch on one file and its debounce loop
//!
//! The OS watch is placed on the file's parent directory (non-recursive) and
//! shared with every other file followed there, so a file that does not exist
//! yet, or is replaced by an atomic rename, is still picked up.
//! Notifications for siblings are filtered out here.

use crate::debounce::Debounce;
use crate::error::{Result, WatchError};
use crate::handle::ActiveWatch;
use crate::registry::RegistryInner;
use crate::shared::SharedWatcher;
use crate::WatchConfig;
use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Weak;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// The file being watched and the directory actually registered with the OS
#[derive(Debug, Clone)]
pub(crate) struct WatchTarget {
    pub(crate) path: PathBuf,
    pub(crate) dir: PathBuf,
}

impl WatchTarget {
    pub(crate) fn new(path: &Path) -> Result<Self> {
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .ok_or_else(|| WatchError::NoParent(path.to_path_buf()))?;

        Ok(Self {
            path: path.to_path_buf(),
            dir: dir.to_path_buf(),
        })
    }
}

/// What a raw notification means for the watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    Relevant,
    FileRemoved,
    DirectoryGone,
    Ignored,
}

pub(crate) fn classify(target: &WatchTarget, event: &notify::Event) -> Change {
    let touches_file = event.paths.iter().any(|p| p == &target.path);
    let touches_dir = event.paths.iter().any(|p| p == &target.dir);

    match event.kind {
        EventKind::Remove(_) if touches_dir => Change::DirectoryGone,
        EventKind::Remove(_) if touches_file => {
            if target.dir.exists() {
                Change::FileRemoved
            } else {
                Change::DirectoryGone
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) if touches_file => Change::FileRemoved,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Any | EventKind::Other
            if touches_file =>
        {
            Change::Relevant
        }
        _ if touches_dir && !target.dir.exists() => Change::DirectoryGone,
        _ => Change::Ignored,
    }
}

/// Start watching `path`, reporting debounced changes to the registry
pub(crate) fn start(
    path: &Path,
    registry: Weak<RegistryInner>,
    config: &WatchConfig,
    watcher: &SharedWatcher,
) -> Result<ActiveWatch> {
    let runtime = Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
    let target = WatchTarget::new(path)?;

    if !target.dir.is_dir() {
        return Err(WatchError::MissingDirectory(target.dir));
    }

    // A missing file is fine, it may be created later
    if let Err(err) = std::fs::File::open(&target.path) {
        if err.kind() == ErrorKind::PermissionDenied {
            return Err(WatchError::Unreadable(target.path));
        }
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let lease = watcher.lease(&target.dir, tx)?;

    let debounce = Debounce::new(config.debounce, config.max_delay);
    let task = runtime.spawn(watch_loop(target, rx, registry, debounce));

    Ok(ActiveWatch { _lease: lease, task })
}

async fn watch_loop(
    target: WatchTarget,
    mut rx: mpsc::UnboundedReceiver<notify::Event>,
    registry: Weak<RegistryInner>,
    mut debounce: Debounce,
) {
    loop {
        let deadline = debounce.deadline();

        tokio::select! {
            received = rx.recv() => {
                let Some(event) = received else {
                    break;
                };

                match classify(&target, &event) {
                    Change::Relevant => debounce.record(Instant::now()),
                    Change::FileRemoved => {
                        debug!(path = %target.path.display(), "watched file removed, waiting for it to return");
                    }
                    Change::DirectoryGone => {
                        warn!(dir = %target.dir.display(), "watched directory removed, stopping watch");
                        if let Some(registry) = registry.upgrade() {
                            registry.detach(&target.path);
                        }
                        return;
                    }
                    Change::Ignored => {}
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                let coalesced = debounce.take();
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.fire(&target.path, coalesced);
            }
        }
    }

    debug!(path = %target.path.display(), "watch loop finished");
}
