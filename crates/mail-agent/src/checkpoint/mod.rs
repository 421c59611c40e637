//! Conversation state persistence keyed by thread id

mod locks;
mod memory;

pub use locks::{ThreadGuard, ThreadLocks};
pub use memory::InMemoryCheckpointer;

use async_trait::async_trait;
use chrono::Local;
use thiserror::Error;

use crate::state::ConversationState;

pub const MAX_THREAD_ID_LEN: usize = 255;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckpointError {
    #[error("Invalid thread id: {0}")]
    InvalidThreadId(String),
    #[error("Checkpoint store failed: {0}")]
    Backend(String),
}

/// Load/save access to committed conversation state.
///
/// Implementations only store and return snapshots; serialising turns per
/// thread is the caller's job (see [`ThreadLocks`]).
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// The last committed state, or `None` for a thread never saved
    async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, CheckpointError>;

    async fn save(&self, thread_id: &str, state: &ConversationState)
        -> Result<(), CheckpointError>;

    /// Returns whether anything was stored under `thread_id`
    async fn delete(&self, thread_id: &str) -> Result<bool, CheckpointError>;

    async fn list(&self) -> Result<Vec<String>, CheckpointError>;
}

/// Thread ids must be non-empty, at most 255 characters and free of control characters
pub fn validate_thread_id(thread_id: &str) -> Result<(), CheckpointError> {
    if thread_id.is_empty() {
        return Err(CheckpointError::InvalidThreadId(
            "thread id is empty".to_string(),
        ));
    }
    if thread_id.chars().count() > MAX_THREAD_ID_LEN {
        return Err(CheckpointError::InvalidThreadId(format!(
            "thread id is longer than {} characters",
            MAX_THREAD_ID_LEN
        )));
    }
    if thread_id.chars().any(char::is_control) {
        return Err(CheckpointError::InvalidThreadId(
            "thread id contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Generate a thread id: local timestamp (yyyymmdd_hhmmss) plus a short random suffix
pub fn generate_thread_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S"), &suffix[..8])
}
