//! Turn routing: after the model proposes tool calls, decide whether the turn
//! ends (control goes back to the UI) or continues through backend execution.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::message::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteDecision {
    /// Nothing left for the server to run. Any proposed calls belong to the UI.
    End,
    /// At least one proposed call is not a frontend action and must be executed here.
    Continue,
}

/// Decide the next step for a batch of proposed calls.
///
/// A batch mixing frontend and backend names yields `Continue` for the whole
/// batch; the frontend calls in it are not handed to the UI.
/// `frontend_tool_names` must be the set supplied with the current turn.
pub fn decide<'a>(
    proposed: impl IntoIterator<Item = &'a ToolCall>,
    frontend_tool_names: &HashSet<String>,
) -> RouteDecision {
    if proposed
        .into_iter()
        .any(|call| !frontend_tool_names.contains(&call.name))
    {
        RouteDecision::Continue
    } else {
        RouteDecision::End
    }
}
