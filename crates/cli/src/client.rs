//! HTTP client for talking to a running server
//!
//! Used by CLI commands to push events to connected browsers. The server may
//! well be down; callers treat every failure here as a logged warning.

use anyhow::{Context, Result};
use redline_core::Topic;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ServerClient {
    base_url: String,
    http: reqwest::Client,
}

impl ServerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the server answers on its root route
    pub async fn ping(&self) -> bool {
        match self.http.get(&self.base_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Poll until the server answers or `wait` elapses
    pub async fn wait_ready(&self, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if self.ping().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Broadcast `event` to every browser watching `topic`
    pub async fn broadcast(&self, topic: &Topic, event: &str, payload: Option<Value>) -> Result<()> {
        let mut body = json!({
            "project_directory": topic.project_directory,
            "file_path": topic.file_path,
            "event": event,
        });
        if let Some(payload) = payload {
            body["payload"] = payload;
        }

        let url = format!("{}/api/events", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach server at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Server rejected broadcast: {}", status);
        }

        debug!(%topic, event, "broadcast sent");
        Ok(())
    }
}

/// Best-effort broadcast; the command succeeds even if nobody is listening
pub async fn notify(base_url: &str, topic: &Topic, event: &str) {
    let result = match ServerClient::new(base_url) {
        Ok(client) => client.broadcast(topic, event, None).await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        warn!(error = %err, event, "Could not notify server (is it running?)");
    }
}
