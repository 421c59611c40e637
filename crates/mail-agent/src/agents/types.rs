use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::message::Message;
use crate::providers::ProviderError;
use crate::state::UiSnapshot;
use crate::tools::FrontendTools;

/// Errors that abort a turn. None of them commit anything to the checkpointer.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model invocation failed: {0}")]
    ModelInvocation(#[from] ProviderError),

    #[error("Malformed tool call {id}: {reason}")]
    MalformedToolCall { id: String, reason: String },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Failed to render system prompt: {0}")]
    Prompt(#[from] minijinja::Error),

    #[error("Turn cancelled")]
    Cancelled,
}

/// Where a turn currently is. A turn starts in `Invoking` and ends in `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    Invoking,
    Routing,
    Executing,
    Done,
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TurnPhase::Invoking => "invoking",
            TurnPhase::Routing => "routing",
            TurnPhase::Executing => "executing",
            TurnPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// One incoming message for a thread, with the UI actions available for this turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub thread_id: String,
    pub message: Message,
    pub frontend_tools: FrontendTools,
    pub ui_snapshot: Option<UiSnapshot>,
}

impl TurnRequest {
    pub fn new(thread_id: impl Into<String>, message: Message, frontend_tools: FrontendTools) -> Self {
        Self {
            thread_id: thread_id.into(),
            message,
            frontend_tools,
            ui_snapshot: None,
        }
    }

    pub fn with_ui_snapshot(mut self, snapshot: UiSnapshot) -> Self {
        self.ui_snapshot = Some(snapshot);
        self
    }
}
