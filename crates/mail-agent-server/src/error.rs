use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mail_agent::agents::AgentError;
use mail_agent::checkpoint::CheckpointError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Thread not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Agent(AgentError::Checkpoint(CheckpointError::InvalidThreadId(_))) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Agent(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
