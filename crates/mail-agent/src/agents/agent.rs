use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::reply_parts::{generate_response_from_provider, prepare_tools_and_prompt};
use super::router::{decide, RouteDecision};
use super::tool_execution::{execute, skipped_frontend_call};
use super::types::{AgentError, TurnPhase, TurnRequest};
use crate::checkpoint::{validate_thread_id, Checkpointer, ThreadLocks};
use crate::config::Config;
use crate::message::{Content, Message, ToolCall};
use crate::providers::Provider;
use crate::state::ConversationState;
use crate::tools::{BackendToolRegistry, FrontendTools};
use crate::utils::is_token_cancelled;

pub const DEFAULT_MAX_TURNS: usize = 25;

pub const MAX_TURNS_MESSAGE: &str =
    "I've reached the maximum number of actions I can do without user input. Would you like me to continue?";

/// Answer recorded for a UI action whose outcome never came back
pub const UNREPORTED_UI_RESULT: &str = "The UI did not report a result for this action.";

#[derive(Clone, Debug)]
pub enum AgentEvent {
    /// A message the turn appended to the thread
    Message(Message),
    /// The turn reached `Done` and this state was committed
    Complete(ConversationState),
}

/// Runs turns for any number of threads.
///
/// Turns on the same thread are serialised; a second request waits until the
/// first has committed. State is loaded at the start of a turn, changed in
/// memory and saved only when the turn reaches `Done`.
pub struct Agent {
    provider: Arc<dyn Provider>,
    checkpointer: Arc<dyn Checkpointer>,
    registry: Arc<BackendToolRegistry>,
    thread_locks: ThreadLocks,
    system_prompt: Option<String>,
    max_turns: usize,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        checkpointer: Arc<dyn Checkpointer>,
        registry: Arc<BackendToolRegistry>,
    ) -> Self {
        let max_turns = Config::global()
            .get_param("MAIL_AGENT_MAX_TURNS")
            .unwrap_or(DEFAULT_MAX_TURNS);

        Self {
            provider,
            checkpointer,
            registry,
            thread_locks: ThreadLocks::new(),
            system_prompt: None,
            max_turns,
        }
    }

    /// Replace the embedded system prompt with a minijinja template
    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = Some(template.into());
        self
    }

    /// Cap on model invocations within one turn
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        self.provider.clone()
    }

    pub fn registry(&self) -> &BackendToolRegistry {
        &self.registry
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// The last committed state of a thread
    pub async fn state(&self, thread_id: &str) -> Result<Option<ConversationState>, AgentError> {
        Ok(self.checkpointer.load(thread_id).await?)
    }

    pub async fn list_threads(&self) -> Result<Vec<String>, AgentError> {
        Ok(self.checkpointer.list().await?)
    }

    /// Delete a thread once any running turn on it has finished
    pub async fn delete_thread(&self, thread_id: &str) -> Result<bool, AgentError> {
        validate_thread_id(thread_id)?;
        let _guard = self.thread_locks.acquire(thread_id).await;
        Ok(self.checkpointer.delete(thread_id).await?)
    }

    /// Run one turn to completion and return the committed state
    pub async fn run_turn(
        &self,
        thread_id: &str,
        message: Message,
        frontend_tools: FrontendTools,
    ) -> Result<ConversationState, AgentError> {
        let request = TurnRequest::new(thread_id, message, frontend_tools);
        let mut stream = self.reply(request, None);

        while let Some(event) = stream.next().await {
            if let AgentEvent::Complete(state) = event? {
                return Ok(state);
            }
        }

        // every path through reply ends in Complete or an error
        Err(AgentError::Cancelled)
    }

    /// Drive one turn: `Invoking -> Routing -> (Executing -> Invoking)* -> Done`.
    ///
    /// Yields every message the turn appends, then `Complete` with the
    /// committed state. An error ends the stream and nothing is saved.
    pub fn reply(
        &self,
        request: TurnRequest,
        cancel_token: Option<CancellationToken>,
    ) -> BoxStream<'_, Result<AgentEvent, AgentError>> {
        Box::pin(async_stream::try_stream! {
            let TurnRequest { thread_id, message, frontend_tools, ui_snapshot } = request;
            validate_thread_id(&thread_id)?;

            let _turn_guard = tokio::select! {
                guard = self.thread_locks.acquire(&thread_id) => Ok(guard),
                _ = wait_for_cancel(&cancel_token) => Err(AgentError::Cancelled),
            }?;

            let mut state = self
                .checkpointer
                .load(&thread_id)
                .await?
                .unwrap_or_default();
            if let Some(snapshot) = ui_snapshot {
                state.apply_ui_snapshot(snapshot);
            }

            // Calls the UI handled without reporting back still need an answer
            // before the model sees the next message
            let unreported: Vec<String> = {
                let answered = message.tool_response_ids();
                state
                    .unanswered_tool_requests()
                    .into_iter()
                    .filter(|id| !answered.contains(id.as_str()))
                    .collect()
            };
            if !unreported.is_empty() {
                debug!(thread_id = %thread_id, "no UI result for {:?}", unreported);
                let placeholder = unreported.iter().fold(Message::tool(), |placeholder, id| {
                    placeholder.with_tool_response(id.as_str(), Ok(vec![Content::text(UNREPORTED_UI_RESULT)]))
                });
                state.push_message(placeholder.clone());
                yield AgentEvent::Message(placeholder);
            }
            state.push_message(message);

            let orphaned = state.orphaned_tool_responses();
            if !orphaned.is_empty() {
                warn!(thread_id = %thread_id, "tool results without a matching request: {:?}", orphaned);
            }

            let frontend_names = frontend_tools.names();
            let mut phase = TurnPhase::Invoking;
            let mut invocations = 0usize;
            let mut pending: Vec<(String, ToolCall)> = Vec::new();

            loop {
                if is_token_cancelled(&cancel_token) {
                    Err::<(), _>(AgentError::Cancelled)?;
                }
                debug!(thread_id = %thread_id, %phase, "turn step");

                match phase {
                    TurnPhase::Invoking => {
                        invocations += 1;
                        if invocations > self.max_turns {
                            let message = Message::assistant().with_text(MAX_TURNS_MESSAGE);
                            state.push_message(message.clone());
                            yield AgentEvent::Message(message);
                            phase = TurnPhase::Done;
                            continue;
                        }

                        // Bound tools and prompt are rebuilt every time: backend tools may have changed the state
                        let (tools, system_prompt) = prepare_tools_and_prompt(
                            &frontend_tools,
                            &self.registry,
                            &state,
                            self.system_prompt.as_deref(),
                        )?;

                        let response = tokio::select! {
                            response = generate_response_from_provider(
                                self.provider.clone(),
                                &system_prompt,
                                &state.messages,
                                &tools,
                            ) => response,
                            _ = wait_for_cancel(&cancel_token) => Err(AgentError::Cancelled),
                        }?;

                        pending = response
                            .tool_calls()?
                            .into_iter()
                            .map(|(id, call)| (id.to_string(), call.clone()))
                            .collect();

                        state.push_message(response.message.clone());
                        yield AgentEvent::Message(response.message);
                        phase = TurnPhase::Routing;
                    }
                    TurnPhase::Routing => {
                        let decision = decide(pending.iter().map(|(_, call)| call), frontend_names);
                        debug!(?decision, calls = pending.len(), "routed");
                        phase = match decision {
                            RouteDecision::End => TurnPhase::Done,
                            RouteDecision::Continue => TurnPhase::Executing,
                        };
                    }
                    TurnPhase::Executing => {
                        for (id, call) in std::mem::take(&mut pending) {
                            let result = if frontend_names.contains(&call.name) {
                                skipped_frontend_call(&id, &call)
                            } else {
                                tokio::select! {
                                    result = execute(&id, &call, &self.registry, &mut state) => Ok(result),
                                    _ = wait_for_cancel(&cancel_token) => Err(AgentError::Cancelled),
                                }?
                            };
                            state.push_message(result.clone());
                            yield AgentEvent::Message(result);
                        }
                        phase = TurnPhase::Invoking;
                    }
                    TurnPhase::Done => {
                        self.checkpointer.save(&thread_id, &state).await?;
                        info!(thread_id = %thread_id, messages = state.messages.len(), invocations, "turn committed");
                        yield AgentEvent::Complete(state);
                        break;
                    }
                }
            }
        })
    }
}

/// Resolves once the token is cancelled; never resolves without a token
async fn wait_for_cancel(cancel_token: &Option<CancellationToken>) {
    match cancel_token {
        Some(token) => token.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointer;
    use crate::model::ModelConfig;
    use crate::providers::{ProviderError, ProviderUsage, Usage};
    use crate::tools::Tool;
    use async_trait::async_trait;

    /// Fails every other call, starting with the first
    struct FlakyProvider {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        async fn complete(
            &self,
            _system: &str,
            _messages: &[Message],
            _tools: &[Tool],
        ) -> Result<(Message, ProviderUsage), ProviderError> {
            let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n % 2 == 0 {
                Err(ProviderError::ServerError("overloaded".to_string()))
            } else {
                Ok((
                    Message::assistant().with_text("hi"),
                    ProviderUsage::new("mock".to_string(), Usage::default()),
                ))
            }
        }

        fn get_model_config(&self) -> ModelConfig {
            ModelConfig::default()
        }
    }

    fn agent() -> Agent {
        Agent::new(
            Arc::new(FlakyProvider {
                calls: Default::default(),
            }),
            Arc::new(InMemoryCheckpointer::new()),
            Arc::new(BackendToolRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_thread_locks_released_after_turns() {
        let agent = agent();

        // a first turn that fails leaves nothing behind
        let failed = agent
            .run_turn("t1", Message::user().with_text("hi"), FrontendTools::default())
            .await;
        assert!(matches!(failed, Err(AgentError::ModelInvocation(_))));
        assert!(agent.thread_locks.is_empty());

        agent
            .run_turn("t2", Message::user().with_text("hi"), FrontendTools::default())
            .await
            .unwrap();
        assert!(agent.thread_locks.is_empty());

        // a stream dropped mid-turn releases its lock too
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = TurnRequest::new("t3", Message::user().with_text("hi"), FrontendTools::default());
        let mut stream = agent.reply(request, Some(cancel));
        assert!(matches!(stream.next().await, Some(Err(AgentError::Cancelled))));
        drop(stream);
        assert!(agent.thread_locks.is_empty());
    }
}
