use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use mail_agent::state::ConversationState;
use serde::Serialize;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadListResponse {
    threads: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadStateResponse {
    thread_id: String,
    state: ConversationState,
}

async fn list_threads(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ThreadListResponse>, ServerError> {
    let threads = state.agent().list_threads().await?;
    Ok(Json(ThreadListResponse { threads }))
}

async fn get_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadStateResponse>, ServerError> {
    match state.agent().state(&thread_id).await? {
        Some(conversation) => Ok(Json(ThreadStateResponse {
            thread_id,
            state: conversation,
        })),
        None => Err(ServerError::NotFound(thread_id)),
    }
}

/// Waits for a running turn on the thread before deleting it
async fn delete_thread(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    if state.agent().delete_thread(&thread_id).await? {
        tracing::info!(thread_id = %thread_id, "thread deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ServerError::NotFound(thread_id))
    }
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/threads", get(list_threads))
        .route("/threads/{thread_id}", get(get_thread).delete(delete_thread))
        .with_state(state)
}
