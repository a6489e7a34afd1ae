//! In-memory event hub for browser connections
//!
//! This crate provides:
//! - `EventHub`: topic-scoped publish/subscribe with bounded per-subscriber
//!   queues and a drop-the-subscriber overflow policy
//! - `Subscription`: the receiving end held by one streaming connection,
//!   unsubscribed automatically on drop
//! - `TopicInterest`: the seam through which the watch registry learns that
//!   a topic gained its first subscriber or lost its last one
//!
//! The hub knows nothing about files or processes. Event names are opaque;
//! only `connected` is produced by the hub itself.

pub mod hub;
pub mod subscription;

// Re-exports
pub use hub::{EventHub, DEFAULT_QUEUE_CAPACITY};
pub use subscription::{SubscriberId, Subscription};

use redline_core::Topic;

/// Listener for changes in topic interest
///
/// Called outside the subscriber lock, so publishing never waits on a slow
/// listener. Notifications are still serialized and arrive in the order the
/// transitions happened. Implementations may publish or query the hub but
/// must not subscribe or unsubscribe from inside a callback.
pub trait TopicInterest: Send + Sync {
    /// `topic` went from zero subscribers to one
    fn interest_gained(&self, topic: &Topic);

    /// `topic` went from one subscriber to zero
    fn interest_lost(&self, topic: &Topic);
}
