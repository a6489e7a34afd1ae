//! Events delivered to subscribers

use crate::Topic;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Sent once, first, to every new subscriber
pub const CONNECTED: &str = "connected";
/// Published by the watch registry when a watched file changes on disk
pub const FILE_UPDATED: &str = "file_updated";
/// Broadcast by the CLI after resolving comments
pub const COMMENTS_RESOLVED: &str = "comments_resolved";
/// Broadcast by the CLI when the page should simply be reloaded
pub const RELOAD: &str = "reload";

/// A named event with an opaque JSON payload
///
/// The hub does not interpret names; apart from `connected`, every event is
/// fanned out the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// The handshake event queued for every new subscriber
    pub fn connected() -> Self {
        Self::new(CONNECTED, json!({ "status": "ok" }))
    }

    /// A file change notification for `topic`
    pub fn file_updated(topic: &Topic) -> Self {
        Self::for_topic(FILE_UPDATED, topic)
    }

    /// An event whose payload identifies the topic it was addressed to
    pub fn for_topic(name: impl Into<String>, topic: &Topic) -> Self {
        Self::new(
            name,
            json!({
                "project_directory": topic.project_directory,
                "file_path": topic.file_path,
            }),
        )
    }

    /// Payload rendered as a single line of JSON
    pub fn data(&self) -> String {
        self.payload.to_string()
    }
}
