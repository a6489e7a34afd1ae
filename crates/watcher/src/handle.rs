//! Reference-counted bookkeeping for one watched path

use crate::shared::DirLease;
use redline_core::Topic;
use std::collections::HashMap;
use tokio::task::JoinHandle;

/// A lease on the directory watch plus the task that debounces its
/// notifications
///
/// Dropping it gives the lease back and aborts the task.
pub(crate) struct ActiveWatch {
    pub(crate) _lease: DirLease,
    pub(crate) task: JoinHandle<()>,
}

impl Drop for ActiveWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Everything the registry knows about one absolute path
///
/// Counts are kept per topic because distinct topics (`./a.md` vs `a.md`)
/// can resolve to the same file, and each must receive its own
/// `file_updated` with its own payload.
pub(crate) struct WatchHandle {
    refs: HashMap<Topic, usize>,
    watch: Option<ActiveWatch>,
}

impl WatchHandle {
    pub(crate) fn new() -> Self {
        Self {
            refs: HashMap::new(),
            watch: None,
        }
    }

    pub(crate) fn ref_count(&self) -> usize {
        self.refs.values().sum()
    }

    pub(crate) fn add(&mut self, topic: Topic) {
        *self.refs.entry(topic).or_insert(0) += 1;
    }

    /// Drop one reference held by `topic`; false if it held none
    pub(crate) fn remove(&mut self, topic: &Topic) -> bool {
        let Some(count) = self.refs.get_mut(topic) else {
            return false;
        };

        *count -= 1;
        if *count == 0 {
            self.refs.remove(topic);
        }
        true
    }

    pub(crate) fn topics(&self) -> Vec<Topic> {
        self.refs.keys().cloned().collect()
    }

    pub(crate) fn attach(&mut self, watch: ActiveWatch) {
        self.watch = Some(watch);
    }

    /// Stop the OS watch but keep the references
    pub(crate) fn detach(&mut self) -> bool {
        self.watch.take().is_some()
    }

    pub(crate) fn is_active(&self) -> bool {
        self.watch.is_some()
    }
}
