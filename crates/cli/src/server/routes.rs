//! Router construction

use super::state::AppState;
use super::{comments, events};
use axum::routing::{get, patch};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(events::home))
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/events", get(events::stream_events).post(events::broadcast))
        .route(
            "/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/comments/{id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        .route("/comments/{id}/resolve", patch(comments::resolve_thread))
}
