use std::sync::Arc;

use chrono::Local;
use serde::Serialize;

use super::types::AgentError;
use crate::message::{Message, ToolCall};
use crate::prompt_template;
use crate::providers::{Provider, ProviderUsage};
use crate::state::{ComposeDraft, ConversationState, EmailSummary};
use crate::tools::{bind_tools, BackendToolRegistry, FrontendTools, Tool, ToolDescriptor, ToolOrigin};
use crate::utils::safe_truncate;

/// How much of the open email's body is shown to the model
const EMAIL_BODY_EXCERPT_CHARS: usize = 500;
/// How many list entries are shown to the model
const VISIBLE_EMAILS: usize = 20;

/// The assistant message produced by one model invocation
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub message: Message,
    pub usage: ProviderUsage,
}

impl ModelResponse {
    pub fn text(&self) -> Option<String> {
        let text = self.message.as_concat_text();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// The proposed calls with their ids, in the order the model emitted them.
    ///
    /// Fails on the first request the provider could not parse.
    pub fn tool_calls(&self) -> Result<Vec<(&str, &ToolCall)>, AgentError> {
        self.message
            .tool_requests()
            .map(|request| match &request.tool_call {
                Ok(call) => Ok((request.id.as_str(), call)),
                Err(e) => Err(AgentError::MalformedToolCall {
                    id: request.id.clone(),
                    reason: e.to_string(),
                }),
            })
            .collect()
    }
}

#[derive(Serialize)]
struct OpenEmailContext<'a> {
    id: &'a str,
    sender: &'a str,
    sender_email: &'a str,
    to: &'a str,
    subject: &'a str,
    date: &'a str,
    body: String,
}

#[derive(Serialize)]
struct SystemPromptContext<'a> {
    current_date: String,
    current_view: String,
    current_email: Option<OpenEmailContext<'a>>,
    filters: Option<String>,
    compose_data: Option<&'a ComposeDraft>,
    emails: &'a [EmailSummary],
    frontend_tools: Vec<&'a str>,
    backend_tools: Vec<&'a str>,
}

fn prompt_context<'a>(
    state: &'a ConversationState,
    bound: &'a [ToolDescriptor],
) -> SystemPromptContext<'a> {
    let names_with_origin = |origin: ToolOrigin| {
        bound
            .iter()
            .filter(|d| d.origin == origin)
            .map(|d| d.name())
            .collect::<Vec<_>>()
    };

    let current_email = state.current_email.as_ref().map(|email| OpenEmailContext {
        id: &email.id,
        sender: &email.sender,
        sender_email: &email.sender_email,
        to: &email.to,
        subject: &email.subject,
        date: &email.date,
        body: safe_truncate(&email.body, EMAIL_BODY_EXCERPT_CHARS),
    });

    let filters = if state.filters.is_empty() {
        None
    } else {
        serde_json::to_string_pretty(&state.filters).ok()
    };

    SystemPromptContext {
        current_date: Local::now().format("%Y-%m-%d").to_string(),
        current_view: state.current_view.to_string(),
        current_email,
        filters,
        compose_data: state.compose_data.as_ref(),
        emails: &state.emails[..state.emails.len().min(VISIBLE_EMAILS)],
        frontend_tools: names_with_origin(ToolOrigin::Frontend),
        backend_tools: names_with_origin(ToolOrigin::Backend),
    }
}

/// Bind this turn's tools and render the system prompt for the current state.
///
/// `template` replaces the embedded prompt file when set; it is rendered with
/// the same context.
pub fn prepare_tools_and_prompt(
    frontend: &FrontendTools,
    registry: &BackendToolRegistry,
    state: &ConversationState,
    template: Option<&str>,
) -> Result<(Vec<ToolDescriptor>, String), AgentError> {
    let bound = bind_tools(frontend, registry);
    let context = prompt_context(state, &bound);

    let system_prompt = match template {
        Some(template) => prompt_template::render_inline_once(template, &context)?,
        None => prompt_template::render_global_file("system.md", &context)?,
    };

    Ok((bound, system_prompt))
}

/// Run one model invocation over the full history with the bound tools
pub async fn generate_response_from_provider(
    provider: Arc<dyn Provider>,
    system_prompt: &str,
    messages: &[Message],
    tools: &[ToolDescriptor],
) -> Result<ModelResponse, AgentError> {
    let tools: Vec<Tool> = tools.iter().map(|d| d.tool.clone()).collect();

    match provider.complete(system_prompt, messages, &tools).await {
        Ok((message, usage)) => {
            tracing::debug!(
                model = %usage.model,
                input_tokens = ?usage.usage.input_tokens,
                output_tokens = ?usage.usage.output_tokens,
                "model responded"
            );
            Ok(ModelResponse { message, usage })
        }
        Err(e) => {
            tracing::error!("model invocation failed: {}", e);
            Err(AgentError::ModelInvocation(e))
        }
    }
}
