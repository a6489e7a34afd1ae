//! Minimal `text/event-stream` reader for tests

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::time::Duration;

/// One dispatched SSE message
#[derive(Debug, Clone, PartialEq)]
pub struct SseMessage {
    pub event: String,
    pub data: String,
}

impl SseMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.data).unwrap_or(serde_json::Value::Null)
    }
}

pub struct SseReader {
    response: reqwest::Response,
    buffer: String,
    pending: VecDeque<SseMessage>,
}

impl SseReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: String::new(),
            pending: VecDeque::new(),
        }
    }

    /// Open a stream for one topic
    pub async fn connect(base_url: &str, project: &str, file: &str) -> Result<Self> {
        let url = format!(
            "{}/api/events?project_directory={}&file_path={}",
            base_url,
            urlencoding::encode(project),
            urlencoding::encode(file)
        );
        // No request timeout: the body is expected to stay open
        let response = reqwest::Client::new()
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        anyhow::ensure!(
            response.status().is_success(),
            "Event stream rejected: {}",
            response.status()
        );
        Ok(Self::new(response))
    }

    /// Next message, or `None` once the server closes the stream
    pub async fn next(&mut self, wait: Duration) -> Result<Option<SseMessage>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(Some(message));
            }

            let chunk = tokio::time::timeout_at(deadline, self.response.chunk())
                .await
                .context("Timed out waiting for event")??;
            match chunk {
                Some(bytes) => {
                    self.buffer.push_str(&String::from_utf8_lossy(&bytes));
                    self.drain_blocks();
                }
                None => return Ok(None),
            }
        }
    }

    /// Next message that is not named `skip`
    pub async fn next_except(&mut self, skip: &str, wait: Duration) -> Result<Option<SseMessage>> {
        loop {
            match self.next(wait).await? {
                Some(message) if message.event == skip => continue,
                other => return Ok(other),
            }
        }
    }

    /// Assert nothing arrives for `wait`
    pub async fn expect_silence(&mut self, wait: Duration) -> Result<()> {
        match self.next(wait).await {
            Err(_) => Ok(()),
            Ok(Some(message)) => anyhow::bail!("Unexpected event: {:?}", message),
            Ok(None) => anyhow::bail!("Stream closed unexpectedly"),
        }
    }

    fn drain_blocks(&mut self) {
        while let Some(end) = self.buffer.find("\n\n") {
            let block: String = self.buffer.drain(..end + 2).collect();
            if let Some(message) = parse_block(&block) {
                self.pending.push_back(message);
            }
        }
    }
}

/// Parse one blank-line terminated block; comment-only blocks yield nothing
fn parse_block(block: &str) -> Option<SseMessage> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event = Some(value.trim_start().to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }
    Some(SseMessage {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block() {
        let message = parse_block("event: connected\ndata: {\"status\":\"ok\"}\n\n").unwrap();
        assert_eq!(message.event, "connected");
        assert_eq!(message.json()["status"], "ok");

        assert!(parse_block(":\n\n").is_none());
    }
}
