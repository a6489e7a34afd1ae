//! Process-wide registry of watched files
//!
//! One watch per absolute path, shared by every topic that resolves to it.
//! The registry is driven by the hub through [`TopicInterest`]: the first
//! subscriber on a topic acquires a reference, the last one leaving releases
//! it, and the watch is torn down when the path's count reaches zero. All
//! paths share a single OS watcher holding one watch per directory.

use crate::error::Result;
use crate::handle::WatchHandle;
use crate::shared::SharedWatcher;
use crate::{watch, WatchConfig};
use parking_lot::Mutex;
use redline_core::{normalize_path, Event, Topic};
use redline_hub::{EventHub, TopicInterest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct WatchRegistry {
    inner: Arc<RegistryInner>,
}

pub(crate) struct RegistryInner {
    hub: EventHub,
    config: WatchConfig,
    state: Mutex<RegistryState>,
    self_ref: Weak<RegistryInner>,
}

#[derive(Default)]
struct RegistryState {
    handles: HashMap<PathBuf, WatchHandle>,
    /// Created on first use, dropped on shutdown
    watcher: Option<Arc<SharedWatcher>>,
    shut_down: bool,
}

impl RegistryState {
    fn watcher(&mut self) -> Result<Arc<SharedWatcher>> {
        if let Some(watcher) = &self.watcher {
            return Ok(Arc::clone(watcher));
        }
        let watcher = SharedWatcher::new()?;
        self.watcher = Some(Arc::clone(&watcher));
        Ok(watcher)
    }
}

impl WatchRegistry {
    /// Create a registry that publishes to `hub`
    ///
    /// Not yet driven by the hub; see [`WatchRegistry::attach`].
    pub fn new(hub: EventHub, config: WatchConfig) -> Self {
        let inner = Arc::new_cyclic(|self_ref| RegistryInner {
            hub,
            config,
            state: Mutex::new(RegistryState::default()),
            self_ref: self_ref.clone(),
        });
        Self { inner }
    }

    /// Create a registry and register it as the hub's interest listener
    pub fn attach(hub: EventHub, config: WatchConfig) -> Self {
        let registry = Self::new(hub.clone(), config);
        let listener: Arc<dyn TopicInterest> = registry.inner.clone();
        hub.set_interest(Arc::downgrade(&listener));
        registry
    }

    /// Take one reference on `path` for `topic`
    pub fn acquire(&self, path: &Path, topic: &Topic) {
        self.inner.acquire(path, topic);
    }

    /// Give back one reference; false if `topic` held none on `path`
    pub fn release(&self, path: &Path, topic: &Topic) -> bool {
        self.inner.release(path, topic)
    }

    /// Stop every watch and refuse new ones
    ///
    /// Idempotent. Returns the number of paths dropped by this call.
    pub fn shutdown(&self) -> usize {
        self.inner.shutdown()
    }

    /// Number of paths with at least one reference
    pub fn watch_count(&self) -> usize {
        self.inner.state.lock().handles.len()
    }

    /// References held on `path`, summed over topics
    pub fn ref_count(&self, path: &Path) -> usize {
        let path = normalize_path(path);
        self.inner
            .state
            .lock()
            .handles
            .get(&path)
            .map_or(0, WatchHandle::ref_count)
    }

    /// Number of directories registered with the OS watcher
    pub fn directory_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .watcher
            .as_ref()
            .map_or(0, |watcher| watcher.directory_count())
    }

    /// Whether an OS watch is currently live for `path`
    pub fn is_watching(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        self.inner
            .state
            .lock()
            .handles
            .get(&path)
            .is_some_and(WatchHandle::is_active)
    }
}

impl RegistryInner {
    fn acquire(&self, path: &Path, topic: &Topic) {
        let path = normalize_path(path);
        let mut state = self.state.lock();

        if state.shut_down {
            debug!(path = %path.display(), "registry shut down, not watching");
            return;
        }

        if let Some(handle) = state.handles.get_mut(&path) {
            handle.add(topic.clone());
            debug!(path = %path.display(), refs = handle.ref_count(), "watch reference added");
            return;
        }

        let mut handle = WatchHandle::new();
        handle.add(topic.clone());

        let started = state
            .watcher()
            .and_then(|watcher| watch::start(&path, self.self_ref.clone(), &self.config, &watcher));

        match started {
            Ok(active) => {
                handle.attach(active);
                info!(path = %path.display(), "watching file");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot watch file, subscribers will not see changes");
            }
        }

        state.handles.insert(path, handle);
    }

    fn release(&self, path: &Path, topic: &Topic) -> bool {
        let path = normalize_path(path);
        let mut state = self.state.lock();

        let Some(handle) = state.handles.get_mut(&path) else {
            debug!(path = %path.display(), "release of unwatched path ignored");
            return false;
        };

        if !handle.remove(topic) {
            debug!(path = %path.display(), %topic, "topic held no reference");
            return false;
        }

        if handle.ref_count() == 0 {
            state.handles.remove(&path);
            info!(path = %path.display(), "stopped watching file");
        }
        true
    }

    fn shutdown(&self) -> usize {
        let mut state = self.state.lock();
        if state.shut_down {
            return 0;
        }
        state.shut_down = true;

        let dropped = state.handles.len();
        state.handles.clear();
        state.watcher = None;

        info!(paths = dropped, "watch registry shut down");
        dropped
    }

    /// Publish `file_updated` to every topic resolving to `path`
    pub(crate) fn fire(&self, path: &Path, coalesced: usize) {
        // Never hold the registry lock into the hub
        let topics = {
            let state = self.state.lock();
            match state.handles.get(path) {
                Some(handle) => handle.topics(),
                None => return,
            }
        };

        for topic in topics {
            let delivered = self.hub.publish(&topic, Event::file_updated(&topic));
            debug!(%topic, coalesced, delivered, "file updated");
        }
    }

    /// Stop the OS watch on `path`, keeping its references
    pub(crate) fn detach(&self, path: &Path) {
        if let Some(handle) = self.state.lock().handles.get_mut(path) {
            handle.detach();
        }
    }
}

impl TopicInterest for RegistryInner {
    fn interest_gained(&self, topic: &Topic) {
        self.acquire(&topic.absolute_path(), topic);
    }

    fn interest_lost(&self, topic: &Topic) {
        self.release(&topic.absolute_path(), topic);
    }
}
