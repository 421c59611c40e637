use crate::message::{Message, ToolCall, ToolError};
use crate::state::ConversationState;
use crate::tools::BackendToolRegistry;

/// Run one backend call and build the tool-result message answering `id`.
///
/// Unknown names and tool failures become an error payload in the result so
/// the model can see them; nothing here ends the turn. Whatever the tool
/// changes in `state` is in place before the caller appends the message.
#[tracing::instrument(skip(call, registry, state), fields(tool = %call.name))]
pub async fn execute(
    id: &str,
    call: &ToolCall,
    registry: &BackendToolRegistry,
    state: &mut ConversationState,
) -> Message {
    let result = match registry.get(&call.name) {
        Some(tool) => tool.call(call.arguments.clone(), state).await,
        None => Err(ToolError::NotFound(call.name.clone())),
    };

    if let Err(e) = &result {
        tracing::warn!("backend tool call {} failed: {}", id, e);
    }

    Message::tool_result(id, result)
}

/// Answer for a frontend call that shared a batch with backend calls.
///
/// The whole batch is routed to the server, so the UI never sees this call;
/// the model gets an error telling it the action did not happen.
pub fn skipped_frontend_call(id: &str, call: &ToolCall) -> Message {
    Message::tool_result(
        id,
        Err(ToolError::ExecutionError(format!(
            "{} is a UI action and was not run because it was requested together with server tools. Request it again on its own.",
            call.name
        ))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Content, MessageContent, Role, ToolResult};
    use crate::state::ComposeDraft;
    use crate::tools::{BackendTool, Tool};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Fills the compose form on the server side
    struct DraftTool;

    #[async_trait]
    impl BackendTool for DraftTool {
        fn tool(&self) -> Tool {
            Tool::new(
                "draftServerSide",
                "Write a draft",
                json!({"type": "object", "properties": {"to": {"type": "string"}}}),
            )
        }

        async fn call(
            &self,
            arguments: Value,
            state: &mut ConversationState,
        ) -> ToolResult<Vec<Content>> {
            let to = arguments
                .get("to")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ToolError::InvalidParameters("missing 'to'".to_string()))?;
            state.compose_data = Some(ComposeDraft {
                to: to.to_string(),
                ..Default::default()
            });
            Ok(vec![Content::text(format!("draft for {}", to))])
        }
    }

    fn tool_result(message: &Message) -> &ToolResult<Vec<Content>> {
        match &message.content[0] {
            MessageContent::ToolResponse(response) => &response.tool_result,
            other => panic!("expected a tool response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_registered_tool_updates_state() {
        let registry = BackendToolRegistry::new().register(DraftTool);
        let mut state = ConversationState::new();

        let call = ToolCall::new("draftServerSide", json!({"to": "bob@example.com"}));
        let message = execute("call_1", &call, &registry, &mut state).await;

        assert_eq!(message.role, Role::Tool);
        assert!(message.tool_response_ids().contains("call_1"));
        let contents = tool_result(&message).as_ref().unwrap();
        assert_eq!(contents[0].as_text(), Some("draft for bob@example.com"));
        assert_eq!(state.compose_data.unwrap().to, "bob@example.com");
    }

    #[tokio::test]
    async fn test_unknown_tool_produces_error_result() {
        let registry = BackendToolRegistry::new();
        let mut state = ConversationState::new();

        let call = ToolCall::new("sendEmailBackend", json!({}));
        let message = execute("call_2", &call, &registry, &mut state).await;

        assert_eq!(
            tool_result(&message),
            &Err(ToolError::NotFound("sendEmailBackend".to_string()))
        );
        assert_eq!(state, ConversationState::new());
    }

    #[tokio::test]
    async fn test_tool_failure_is_carried_in_result() {
        let registry = BackendToolRegistry::new().register(DraftTool);
        let mut state = ConversationState::new();

        let call = ToolCall::new("draftServerSide", Value::String("{\"to\":".to_string()));
        let message = execute("call_3", &call, &registry, &mut state).await;

        assert!(matches!(
            tool_result(&message),
            Err(ToolError::InvalidParameters(_))
        ));
        assert!(state.compose_data.is_none());
    }

    #[test]
    fn test_skipped_frontend_call() {
        let message = skipped_frontend_call("call_4", &ToolCall::new("setFilters", json!({})));
        match tool_result(&message) {
            Err(ToolError::ExecutionError(text)) => assert!(text.starts_with("setFilters is a UI action")),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
