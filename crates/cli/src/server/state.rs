//! Shared handler state

use redline_hub::EventHub;
use redline_store::Store;
use redline_watcher::{WatchConfig, WatchRegistry};
use std::sync::Arc;

/// Everything a request handler can reach
///
/// Cloned per request; all fields are shared handles.
#[derive(Clone)]
pub struct AppState {
    pub hub: EventHub,
    pub registry: WatchRegistry,
    pub store: Arc<Store>,
}

impl AppState {
    /// Wire a fresh hub to a watch registry over `store`
    pub fn new(store: Arc<Store>, queue_capacity: usize, watch: WatchConfig) -> Self {
        let hub = EventHub::with_capacity(queue_capacity);
        let registry = WatchRegistry::attach(hub.clone(), watch);
        Self {
            hub,
            registry,
            store,
        }
    }

    /// End every stream and stop every watch
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        self.registry.shutdown();
        self.hub.close();
    }
}
