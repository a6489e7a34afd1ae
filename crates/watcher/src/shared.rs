//! One OS watcher shared by every watched file
//!
//! Each directory is registered with the OS once, however many files in it
//! are followed. Notifications are fanned out to every route leased on the
//! directory they concern; each route filters for its own file.

use crate::error::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub(crate) type EventSender = mpsc::UnboundedSender<notify::Event>;

type RouteId = u64;

/// directory -> routes interested in it
#[derive(Default)]
struct Routes {
    dirs: HashMap<PathBuf, HashMap<RouteId, EventSender>>,
}

impl Routes {
    /// Senders for every directory an event path lives in or names
    fn targets(&self, event: &notify::Event) -> Vec<EventSender> {
        let mut targets: HashMap<RouteId, EventSender> = HashMap::new();

        for path in &event.paths {
            let owners = [Some(path.as_path()), path.parent()];
            for dir in owners.into_iter().flatten() {
                if let Some(routes) = self.dirs.get(dir) {
                    for (id, tx) in routes {
                        targets.entry(*id).or_insert_with(|| tx.clone());
                    }
                }
            }
        }

        targets.into_values().collect()
    }
}

pub(crate) struct SharedWatcher {
    /// Guards watch/unwatch so the first/last decision and the OS call stay
    /// together. Never taken while `routes` is held.
    os: Mutex<RecommendedWatcher>,
    /// Shared with the notify callback, which only ever takes this lock
    routes: Arc<Mutex<Routes>>,
    next_route: AtomicU64,
    self_ref: Weak<SharedWatcher>,
}

impl SharedWatcher {
    pub(crate) fn new() -> Result<Arc<Self>> {
        let routes = Arc::new(Mutex::new(Routes::default()));

        let callback_routes = Arc::clone(&routes);
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let targets = callback_routes.lock().targets(&event);
                for tx in targets {
                    let _ = tx.send(event.clone());
                }
            }
            Err(err) => warn!(error = %err, paths = ?err.paths, "filesystem watch error"),
        })?;

        Ok(Arc::new_cyclic(|self_ref| Self {
            os: Mutex::new(watcher),
            routes,
            next_route: AtomicU64::new(1),
            self_ref: self_ref.clone(),
        }))
    }

    /// Route notifications about `dir` into `tx` until the lease drops
    pub(crate) fn lease(&self, dir: &Path, tx: EventSender) -> Result<DirLease> {
        let id = self.next_route.fetch_add(1, Ordering::Relaxed);
        let mut os = self.os.lock();

        let first = {
            let mut routes = self.routes.lock();
            let entry = routes.dirs.entry(dir.to_path_buf()).or_default();
            let first = entry.is_empty();
            entry.insert(id, tx);
            first
        };

        if first {
            if let Err(err) = os.watch(dir, RecursiveMode::NonRecursive) {
                self.routes.lock().dirs.remove(dir);
                return Err(err.into());
            }
            debug!(dir = %dir.display(), "directory watch added");
        }

        Ok(DirLease {
            watcher: self.self_ref.clone(),
            dir: dir.to_path_buf(),
            id,
        })
    }

    fn release(&self, dir: &Path, id: RouteId) {
        let mut os = self.os.lock();

        let last = {
            let mut routes = self.routes.lock();
            match routes.dirs.get_mut(dir) {
                Some(entry) => {
                    entry.remove(&id);
                    let last = entry.is_empty();
                    if last {
                        routes.dirs.remove(dir);
                    }
                    last
                }
                None => false,
            }
        };

        if last {
            // Fails harmlessly when the directory itself is gone
            match os.unwatch(dir) {
                Ok(()) => debug!(dir = %dir.display(), "directory watch removed"),
                Err(err) => debug!(dir = %dir.display(), error = %err, "directory unwatch failed"),
            }
        }
    }

    /// Number of directories registered with the OS
    pub(crate) fn directory_count(&self) -> usize {
        self.routes.lock().dirs.len()
    }
}

/// One file's claim on its directory watch
pub(crate) struct DirLease {
    watcher: Weak<SharedWatcher>,
    dir: PathBuf,
    id: RouteId,
}

impl Drop for DirLease {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.upgrade() {
            watcher.release(&self.dir, self.id);
        }
    }
}
