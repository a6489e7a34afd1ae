//! Topic-scoped broadcaster

use crate::subscription::{SubscriberId, Subscription};
use crate::TopicInterest;
use parking_lot::Mutex;
use redline_core::{Event, Topic};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// Default number of events buffered per subscriber
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Process-wide publish/subscribe hub
///
/// Cheap to clone; all clones share the same subscriber map. Publishing never
/// waits on a subscriber: a subscriber whose queue is full or whose
/// connection is gone is dropped on the spot.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

pub(crate) struct HubInner {
    /// Serializes interest notifications. Taken before `state`, and held
    /// while the listener runs so gained/lost calls keep their order.
    interest: Mutex<()>,
    state: Mutex<HubState>,
    next_id: AtomicU64,
    capacity: usize,
}

#[derive(Default)]
struct HubState {
    /// topic -> live subscribers
    topics: HashMap<Topic, HashMap<SubscriberId, mpsc::Sender<Event>>>,
    /// subscriber -> its topic, so unsubscribe only needs the id
    owners: HashMap<SubscriberId, Topic>,
    interest: Option<Weak<dyn TopicInterest>>,
    closed: bool,
}

/// Change in whether a topic has subscribers
enum Transition {
    Gained(Topic),
    Lost(Topic),
}

impl HubState {
    fn listener(&self) -> Option<Arc<dyn TopicInterest>> {
        self.interest.as_ref().and_then(Weak::upgrade)
    }

    /// Remove one subscriber, recording a transition if it was the last
    fn remove(&mut self, id: SubscriberId, transitions: &mut Vec<Transition>) -> bool {
        let Some(topic) = self.owners.remove(&id) else {
            return false;
        };

        let now_empty = match self.topics.get_mut(&topic) {
            Some(subscribers) => {
                subscribers.remove(&id);
                subscribers.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.topics.remove(&topic);
            transitions.push(Transition::Lost(topic));
        }

        true
    }
}

impl HubInner {
    /// Mutate the state, then tell the listener what changed
    ///
    /// The state lock is released before the listener runs, so it may block
    /// or call back into the hub without stalling publishers.
    fn with_transitions<T>(&self, f: impl FnOnce(&mut HubState, &mut Vec<Transition>) -> T) -> T {
        let _order = self.interest.lock();
        let mut transitions = Vec::new();

        let (result, listener) = {
            let mut state = self.state.lock();
            let result = f(&mut state, &mut transitions);
            (result, state.listener())
        };

        if let Some(listener) = listener {
            for transition in &transitions {
                match transition {
                    Transition::Gained(topic) => listener.interest_gained(topic),
                    Transition::Lost(topic) => listener.interest_lost(topic),
                }
            }
        }

        result
    }

    pub(crate) fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.with_transitions(|state, transitions| state.remove(id, transitions));
        if removed {
            debug!(subscriber = %id, "unsubscribed");
        }
        removed
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a hub whose subscribers buffer up to `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                interest: Mutex::new(()),
                state: Mutex::new(HubState::default()),
                next_id: AtomicU64::new(1),
                // The connected event must always fit
                capacity: capacity.max(1),
            }),
        }
    }

    /// Attach the listener told about first/last subscribers of a topic
    ///
    /// Held weakly; the listener's owner keeps it alive.
    pub fn set_interest(&self, listener: Weak<dyn TopicInterest>) {
        self.inner.state.lock().interest = Some(listener);
    }

    /// Register a subscriber on `topic`
    ///
    /// The `connected` event is already queued when this returns.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.inner.capacity);

        // Fresh queue with room for at least one event
        let _ = tx.try_send(Event::connected());

        let registered = self.inner.with_transitions(|state, transitions| {
            if state.closed {
                return None;
            }

            let subscribers = state.topics.entry(topic.clone()).or_default();
            let first = subscribers.is_empty();
            subscribers.insert(id, tx);
            state.owners.insert(id, topic.clone());

            if first {
                transitions.push(Transition::Gained(topic.clone()));
            }
            Some(first)
        });

        match registered {
            Some(first) => {
                debug!(subscriber = %id, %topic, first, "subscribed");
                Subscription::new(id, topic, rx, Arc::downgrade(&self.inner))
            }
            None => {
                // Sender already dropped: the stream yields `connected` and ends
                debug!(subscriber = %id, %topic, "hub closed, subscription will end immediately");
                Subscription::new(id, topic, rx, Weak::new())
            }
        }
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.unsubscribe(id)
    }

    /// Queue `event` for every subscriber currently on `topic`
    ///
    /// Returns how many subscribers accepted the event.
    pub fn publish(&self, topic: &Topic, event: Event) -> usize {
        let mut delivered = 0;
        let mut evicted = Vec::new();

        {
            let state = self.inner.state.lock();
            let Some(subscribers) = state.topics.get(topic) else {
                debug!(%topic, event = %event.name, "no subscribers");
                return 0;
            };

            for (id, tx) in subscribers {
                match tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(subscriber = %id, %topic, "subscriber queue full, disconnecting it");
                        evicted.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(subscriber = %id, %topic, "subscriber connection gone");
                        evicted.push(*id);
                    }
                }
            }
        }

        // Only evictions touch interest; plain delivery never waits on the listener
        if !evicted.is_empty() {
            self.inner.with_transitions(|state, transitions| {
                for id in evicted {
                    state.remove(id, transitions);
                }
            });
        }

        debug!(%topic, event = %event.name, delivered, "published");
        delivered
    }

    /// Drop every subscriber and refuse new registrations
    ///
    /// Idempotent. Returns the number of subscribers closed by this call.
    pub fn close(&self) -> usize {
        let closed = self.inner.with_transitions(|state, transitions| {
            if state.closed {
                return None;
            }
            state.closed = true;
            state.owners.clear();

            let mut closed = 0;
            for (topic, subscribers) in std::mem::take(&mut state.topics) {
                closed += subscribers.len();
                transitions.push(Transition::Lost(topic));
            }
            Some(closed)
        });

        match closed {
            Some(closed) => {
                info!(subscribers = closed, "event hub closed");
                closed
            }
            None => 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of live subscribers on `topic`
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner
            .state
            .lock()
            .topics
            .get(topic)
            .map_or(0, HashMap::len)
    }

    /// Number of topics with at least one subscriber
    pub fn topic_count(&self) -> usize {
        self.inner.state.lock().topics.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
