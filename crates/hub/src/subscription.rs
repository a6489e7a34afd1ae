//! Receiving side of a hub subscription

use crate::hub::HubInner;
use chrono::{DateTime, Utc};
use redline_core::{Event, Topic};
use std::fmt;
use std::sync::Weak;
use tokio::sync::mpsc;

/// Unique id of one subscriber for the lifetime of the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) u64);

impl SubscriberId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One live connection's view of the hub
///
/// Yields `connected` first, then every event published to its topic after
/// it was registered. The stream ends when the hub evicts the subscriber or
/// is closed. Dropping the subscription unsubscribes it.
pub struct Subscription {
    id: SubscriberId,
    topic: Topic,
    created_at: DateTime<Utc>,
    rx: mpsc::Receiver<Event>,
    hub: Weak<HubInner>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        topic: Topic,
        rx: mpsc::Receiver<Event>,
        hub: Weak<HubInner>,
    ) -> Self {
        Self {
            id,
            topic,
            created_at: Utc::now(),
            rx,
            hub,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the hub has dropped this subscriber and every
    /// queued event has been read.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}
