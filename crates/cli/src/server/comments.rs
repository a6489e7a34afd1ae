//! Comment API

use super::error::ApiError;
use super::state::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use redline_store::{Comment, NewComment, StoreError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// Who resolves threads from the browser
const WEB_RESOLVER: &str = "user";

pub async fn create_comment(
    State(state): State<AppState>,
    body: Result<Json<NewComment>, JsonRejection>,
) -> Result<Json<Comment>, ApiError> {
    let Json(new) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let comment = state.store.add_comment(new)?;

    info!(id = comment.id, file = %comment.file_path, "comment created");
    Ok(Json(comment))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentQuery {
    pub project_directory: String,
    pub file_path: String,
    pub include_resolved: bool,
}

pub async fn list_comments(
    State(state): State<AppState>,
    query: Result<Query<CommentQuery>, QueryRejection>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let Query(query) = query.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    if query.project_directory.is_empty() || query.file_path.is_empty() {
        return Err(ApiError::bad_request(
            "project_directory and file_path are required",
        ));
    }

    let comments = state.store.comments(
        &query.project_directory,
        &query.file_path,
        query.include_resolved,
    )?;
    Ok(Json(comments))
}

/// Resolve the whole thread the comment belongs to
pub async fn resolve_thread(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::bad_request("Invalid comment ID"))?;

    let comment = state
        .store
        .comment(id)?
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    let count = state.store.resolve_thread(comment.thread_id(), WEB_RESOLVER)?;
    info!(id, root = comment.thread_id(), count, "thread resolved");

    Ok(Json(json!({ "status": "resolved", "count": count })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateRequest {
    pub comment_text: String,
}

/// Edit a comment's text; refused once someone has replied
pub async fn update_comment(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<Comment>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::bad_request("Invalid comment ID"))?;
    let Json(update) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let comment = state
        .store
        .update_comment(id, &update.comment_text)
        .map_err(|err| match err {
            StoreError::CommentNotFound(_) => ApiError::NotFound("Comment not found".to_string()),
            other => ApiError::from(other),
        })?;

    info!(id, "comment updated");
    Ok(Json(comment))
}

/// Delete a comment and, for a root, its whole thread
pub async fn delete_comment(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id.map_err(|_| ApiError::bad_request("Invalid comment ID"))?;

    let count = state.store.delete_comment(id)?;
    info!(id, count, "comment deleted");

    Ok(Json(json!({ "status": "deleted" })))
}
