//! Event stream and broadcast endpoints

use super::error::ApiError;
use super::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header::{self, HeaderName};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream;
use redline_core::{Event, Topic};
use redline_hub::Subscription;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct TopicParams {
    pub project_directory: Option<String>,
    pub file_path: Option<String>,
}

impl TopicParams {
    fn into_topic(self) -> Result<Topic, ApiError> {
        let project_directory = self
            .project_directory
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("project_directory is required"))?;
        let file_path = self
            .file_path
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("file_path is required"))?;

        Ok(Topic::new(project_directory, file_path))
    }
}

fn frame(event: &Event) -> SseEvent {
    SseEvent::default().event(&event.name).data(event.data())
}

/// `GET /api/events`: stream events for one file
///
/// Parameters are checked before subscribing, so a bad request never
/// touches the hub.
pub async fn stream_events(
    State(state): State<AppState>,
    params: Result<Query<TopicParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let topic = params.into_topic()?;

    let subscription = state.hub.subscribe(topic);
    info!(subscriber = %subscription.id(), topic = %subscription.topic(), "event stream opened");

    // Dropping the stream drops the subscription, which unsubscribes it
    let events = stream::unfold(subscription, |mut sub: Subscription| async move {
        let event = sub.recv().await?;
        Some((Ok::<_, Infallible>(frame(&event)), sub))
    });

    let headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    Ok((headers, Sse::new(events).keep_alive(KeepAlive::default())))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BroadcastRequest {
    pub project_directory: String,
    pub file_path: String,
    pub event: String,
    pub payload: Option<Value>,
}

/// `POST /api/events`: fan an event out to one file's subscribers
pub async fn broadcast(
    State(state): State<AppState>,
    body: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    if request.project_directory.is_empty() {
        return Err(ApiError::bad_request("project_directory is required"));
    }
    if request.file_path.is_empty() {
        return Err(ApiError::bad_request("file_path is required"));
    }
    if request.event.is_empty() {
        return Err(ApiError::bad_request("event is required"));
    }
    if request.event.contains(['\r', '\n']) {
        return Err(ApiError::bad_request("event name must be a single line"));
    }

    let topic = Topic::new(request.project_directory, request.file_path);
    let event = match request.payload {
        Some(payload) => Event::new(request.event, payload),
        None => Event::for_topic(request.event, &topic),
    };

    let name = event.name.clone();
    let delivered = state.hub.publish(&topic, event);
    info!(%topic, event = %name, delivered, "broadcast");

    Ok(Json(json!({ "status": "broadcast" })))
}

/// `GET /`: registered projects; doubles as the readiness probe
pub async fn home(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let projects = state.store.projects()?;
    Ok(Json(json!({ "projects": projects })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_params_require_both_fields() {
        let full = TopicParams {
            project_directory: Some("/p".into()),
            file_path: Some("test.md".into()),
        };
        assert_eq!(full.into_topic().unwrap(), Topic::new("/p", "test.md"));

        let empty_file = TopicParams {
            project_directory: Some("/p".into()),
            file_path: Some(String::new()),
        };
        assert!(matches!(empty_file.into_topic(), Err(ApiError::BadRequest(_))));

        assert!(TopicParams::default().into_topic().is_err());
    }
}
