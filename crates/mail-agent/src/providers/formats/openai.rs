use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::message::{Message, MessageContent, Role, ToolCall, ToolError};
use crate::model::ModelConfig;
use crate::providers::base::Usage;
use crate::providers::utils::{is_valid_function_name, sanitize_function_name};
use crate::tools::Tool;

const ROLE_FIELD: &str = "role";
const CONTENT_FIELD: &str = "content";
const TOOL_CALLS_FIELD: &str = "tool_calls";
const TOOL_CALL_ID_FIELD: &str = "tool_call_id";
const FUNCTION_FIELD: &str = "function";
const ID_FIELD: &str = "id";
const NAME_FIELD: &str = "name";
const ARGUMENTS_FIELD: &str = "arguments";
const TYPE_FIELD: &str = "type";
const FUNCTION_TYPE: &str = "function";

/// Convert internal messages to the chat-completions `messages` array.
///
/// Every tool response becomes its own `tool` message so each one can carry
/// the `tool_call_id` it answers.
pub fn format_messages(messages: &[Message]) -> Vec<Value> {
    let mut formatted = Vec::new();

    for message in messages {
        let mut converted = json!({
            ROLE_FIELD: match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            }
        });

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut tool_outputs = Vec::new();

        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        text_parts.push(text.text.clone());
                    }
                }
                MessageContent::ToolRequest(request) => match &request.tool_call {
                    Ok(tool_call) => {
                        tool_calls.push(json!({
                            ID_FIELD: request.id,
                            TYPE_FIELD: FUNCTION_TYPE,
                            FUNCTION_FIELD: {
                                NAME_FIELD: sanitize_function_name(&tool_call.name),
                                ARGUMENTS_FIELD: arguments_to_string(&tool_call.arguments),
                            }
                        }));
                    }
                    Err(e) => {
                        text_parts.push(format!("Error: {}", e));
                    }
                },
                MessageContent::ToolResponse(response) => {
                    let output = match &response.tool_result {
                        Ok(contents) => {
                            let text = contents
                                .iter()
                                .filter_map(|c| c.as_text())
                                .collect::<Vec<_>>()
                                .join("\n");
                            if text.is_empty() {
                                "Tool call is done.".to_string()
                            } else {
                                text
                            }
                        }
                        Err(e) => format!("Error: {}", e),
                    };
                    tool_outputs.push(json!({
                        ROLE_FIELD: "tool",
                        TOOL_CALL_ID_FIELD: response.id,
                        CONTENT_FIELD: output,
                    }));
                }
            }
        }

        if !text_parts.is_empty() {
            converted[CONTENT_FIELD] = json!(text_parts.join("\n"));
        }
        if !tool_calls.is_empty() {
            converted[TOOL_CALLS_FIELD] = json!(tool_calls);
        }

        if converted.get(CONTENT_FIELD).is_some() || converted.get(TOOL_CALLS_FIELD).is_some() {
            formatted.push(converted);
        }
        formatted.extend(tool_outputs);
    }

    formatted
}

// Arguments the model sent as unparseable text are kept as a JSON string and go back verbatim
fn arguments_to_string(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Convert tools to the chat-completions `tools` array
pub fn format_tools(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            TYPE_FIELD: FUNCTION_TYPE,
            FUNCTION_FIELD: {
                NAME_FIELD: tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Convert a chat-completions response into an assistant message.
///
/// A tool call without a function name or id is kept as a failed request so
/// the turn runner can reject it; arguments that are not valid JSON are kept
/// as a string.
pub fn response_to_message(response: Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow!("Invalid response format: missing choices[0].message"))?;

    let mut message = Message::assistant();

    if let Some(text) = original.get(CONTENT_FIELD).and_then(|t| t.as_str()) {
        if !text.is_empty() {
            message = message.with_text(text);
        }
    }

    if let Some(tool_calls) = original.get(TOOL_CALLS_FIELD).and_then(|t| t.as_array()) {
        for (index, tool_call) in tool_calls.iter().enumerate() {
            let id = tool_call
                .get(ID_FIELD)
                .and_then(|i| i.as_str())
                .unwrap_or_default()
                .to_string();
            let function = tool_call.get(FUNCTION_FIELD);
            let name = function
                .and_then(|f| f.get(NAME_FIELD))
                .and_then(|n| n.as_str())
                .unwrap_or_default();

            if id.is_empty() {
                message = message.with_tool_request(
                    format!("missing_id_{}", index),
                    Err(ToolError::InvalidParameters(format!(
                        "Tool call {} has no id",
                        index
                    ))),
                );
                continue;
            }

            if name.is_empty() {
                message = message.with_tool_request(
                    id,
                    Err(ToolError::InvalidParameters(
                        "Tool call has no function name".to_string(),
                    )),
                );
                continue;
            }

            if !is_valid_function_name(name) {
                tracing::debug!("model proposed tool name with invalid characters: {}", name);
            }

            let arguments = function
                .and_then(|f| f.get(ARGUMENTS_FIELD))
                .map(parse_arguments)
                .unwrap_or_else(|| json!({}));

            message = message.with_tool_request(id, Ok(ToolCall::new(name, arguments)));
        }
    }

    Ok(message)
}

fn parse_arguments(raw: &Value) -> Value {
    match raw {
        Value::String(s) if s.trim().is_empty() => json!({}),
        Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone())),
        Value::Null => json!({}),
        other => other.clone(),
    }
}

/// Extract usage from the `usage` object of a response
pub fn get_usage(usage: &Value) -> Usage {
    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32);

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .map(|v| v as i32)
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => None,
        });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

pub fn create_request(
    model_config: &ModelConfig,
    system: &str,
    messages: &[Message],
    tools: &[Tool],
) -> Result<Value> {
    let is_reasoning_model = model_config.is_reasoning_model();

    let system_message = json!({
        ROLE_FIELD: if is_reasoning_model { "developer" } else { "system" },
        CONTENT_FIELD: system
    });

    let mut messages_spec = vec![system_message];
    messages_spec.extend(format_messages(messages));

    let mut payload = json!({
        "model": model_config.model_name,
        "messages": messages_spec,
    });

    let tools_spec = format_tools(tools)?;
    if !tools_spec.is_empty() {
        payload["tools"] = json!(tools_spec);
    }

    if !is_reasoning_model {
        if let Some(temp) = model_config.temperature {
            payload["temperature"] = json!(temp);
        }
    }

    if let Some(tokens) = model_config.max_tokens {
        let key = if is_reasoning_model {
            "max_completion_tokens"
        } else {
            "max_tokens"
        };
        payload[key] = json!(tokens);
    }

    Ok(payload)
}
