use crate::state::AppState;
use axum::{
    extract::State,
    http::{self, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use mail_agent::{
    agents::{AgentEvent, TurnRequest},
    checkpoint::generate_thread_id,
    message::Message,
    state::{ConversationState, UiSnapshot},
    tools::{FrontendTools, ToolDescriptor},
};
use serde::{Deserialize, Serialize};
use std::{
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest {
    /// Omitted on the first message of a conversation
    #[serde(default)]
    thread_id: Option<String>,
    message: Message,
    /// The UI actions available for this turn only
    #[serde(default)]
    frontend_tools: Vec<ToolDescriptor>,
    #[serde(default)]
    ui_state: Option<UiSnapshot>,
}

pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        match http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to build SSE response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum MessageEvent {
    Message {
        message: Message,
    },
    Error {
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    Finish {
        thread_id: String,
        state: ConversationState,
    },
}

async fn stream_event(
    event: MessageEvent,
    tx: &mpsc::Sender<String>,
) -> Result<(), mpsc::error::SendError<String>> {
    let json = serde_json::to_string(&event).unwrap_or_else(|e| {
        format!(
            r#"{{"type":"Error","error":"Failed to serialize event: {}"}}"#,
            e
        )
    });
    tx.send(format!("data: {}\n\n", json)).await
}

async fn reply_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReplyRequest>,
) -> Result<SseResponse, StatusCode> {
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);
    let cancel_token = CancellationToken::new();

    let thread_id = request.thread_id.unwrap_or_else(generate_thread_id);
    let mut turn = TurnRequest::new(
        thread_id.clone(),
        request.message,
        FrontendTools::from_descriptors(request.frontend_tools),
    );
    if let Some(snapshot) = request.ui_state {
        turn = turn.with_ui_snapshot(snapshot);
    }

    let agent = state.agent();

    std::mem::drop(tokio::spawn(async move {
        let mut stream = agent.reply(turn, Some(cancel_token.clone()));
        let mut disconnected = false;

        loop {
            tokio::select! {
                _ = tx.closed(), if !disconnected => {
                    // keep draining so the turn unwinds through cancellation
                    tracing::info!(thread_id = %thread_id, "client disconnected, cancelling turn");
                    cancel_token.cancel();
                    disconnected = true;
                }
                event = stream.next() => {
                    match event {
                        Some(Ok(AgentEvent::Message(message))) => {
                            if let Err(e) = stream_event(MessageEvent::Message { message }, &tx).await {
                                tracing::debug!("Error sending message through channel: {}", e);
                            }
                        }
                        Some(Ok(AgentEvent::Complete(conversation))) => {
                            let _ = stream_event(
                                MessageEvent::Finish {
                                    thread_id: thread_id.clone(),
                                    state: conversation,
                                },
                                &tx,
                            )
                            .await;
                        }
                        Some(Err(e)) => {
                            if disconnected {
                                tracing::info!(thread_id = %thread_id, "turn ended: {}", e);
                            } else {
                                tracing::error!(thread_id = %thread_id, "Error processing turn: {}", e);
                                let _ = stream_event(
                                    MessageEvent::Error {
                                        error: e.to_string(),
                                    },
                                    &tx,
                                )
                                .await;
                            }
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
    }));

    Ok(SseResponse::new(stream))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/reply", post(reply_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail_agent::{
        agents::Agent,
        checkpoint::InMemoryCheckpointer,
        message::ToolCall,
        model::ModelConfig,
        providers::{Provider, ProviderError, ProviderUsage, Usage},
        tools::{BackendToolRegistry, Tool},
    };
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Answers with the queued messages in order, then with plain text
    struct MockProvider {
        responses: Mutex<Vec<Result<Message, ProviderError>>>,
    }

    impl MockProvider {
        fn new(mut responses: Vec<Result<Message, ProviderError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        async fn complete(
            &self,
            _system: &str,
            _messages: &[Message],
            _tools: &[Tool],
        ) -> Result<(Message, ProviderUsage), ProviderError> {
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Message::assistant().with_text("Mock response")));
            next.map(|message| (message, ProviderUsage::new("mock".to_string(), Usage::default())))
        }

        fn get_model_config(&self) -> ModelConfig {
            ModelConfig::new("test-model".to_string())
        }
    }

    mod integration_tests {
        use super::*;
        use axum::{body::Body, http::Request};
        use tower::ServiceExt;

        fn app(provider: MockProvider) -> Router {
            let agent = Agent::new(
                Arc::new(provider),
                Arc::new(InMemoryCheckpointer::new()),
                Arc::new(BackendToolRegistry::new()),
            );
            crate::routes::configure(AppState::new(Arc::new(agent)))
        }

        fn reply_request(body: Value) -> Request<Body> {
            Request::builder()
                .uri("/reply")
                .method("POST")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        }

        /// Collect the `data:` payloads of an SSE body
        async fn events(response: axum::response::Response) -> Vec<Value> {
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            String::from_utf8(body.to_vec())
                .unwrap()
                .split("\n\n")
                .filter_map(|chunk| chunk.strip_prefix("data: "))
                .map(|data| serde_json::from_str(data).unwrap())
                .collect()
        }

        #[tokio::test]
        async fn test_reply_endpoint() {
            let app = app(MockProvider::new(vec![]));

            let response = app
                .oneshot(reply_request(json!({
                    "threadId": "test-thread",
                    "message": Message::user().with_text("test message"),
                })))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()["content-type"],
                "text/event-stream"
            );

            let events = events(response).await;
            assert_eq!(events.len(), 2);
            assert_eq!(events[0]["type"], "Message");
            assert_eq!(events[0]["message"]["content"][0]["text"], "Mock response");
            assert_eq!(events[1]["type"], "Finish");
            assert_eq!(events[1]["threadId"], "test-thread");
            assert_eq!(
                events[1]["state"]["messages"].as_array().unwrap().len(),
                2
            );
        }

        #[tokio::test]
        async fn test_frontend_call_returns_to_ui_and_is_stored() {
            let app = app(MockProvider::new(vec![Ok(Message::assistant()
                .with_tool_request(
                    "call_1",
                    Ok(ToolCall::new("navigateTo", json!({"view": "sent"}))),
                ))]));

            let response = app
                .clone()
                .oneshot(reply_request(json!({
                    "threadId": "ui-thread",
                    "message": Message::user().with_text("show my sent mail"),
                    "frontendTools": [
                        {"name": "navigateTo", "description": "Switch view", "origin": "frontend"}
                    ],
                    "uiState": {"currentView": "detail"}
                })))
                .await
                .unwrap();

            let events = events(response).await;
            assert_eq!(events.len(), 2);
            assert_eq!(
                events[0]["message"]["content"][0]["toolCall"]["value"]["name"],
                "navigateTo"
            );
            assert_eq!(events[1]["state"]["currentView"], "detail");

            let stored = app
                .oneshot(
                    Request::builder()
                        .uri("/threads/ui-thread")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(stored.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn test_thread_id_is_generated_when_missing() {
            let app = app(MockProvider::new(vec![]));

            let response = app
                .oneshot(reply_request(json!({
                    "message": Message::user().with_text("hi"),
                })))
                .await
                .unwrap();

            let events = events(response).await;
            let thread_id = events[1]["threadId"].as_str().unwrap();
            assert_eq!(thread_id.len(), "20250101_120000_".len() + 8);
        }

        #[tokio::test]
        async fn test_provider_error_is_streamed() {
            let app = app(MockProvider::new(vec![Err(ProviderError::Authentication(
                "bad key".to_string(),
            ))]));

            let response = app
                .clone()
                .oneshot(reply_request(json!({
                    "threadId": "broken",
                    "message": Message::user().with_text("hi"),
                })))
                .await
                .unwrap();

            let events = events(response).await;
            assert_eq!(events.len(), 1);
            assert_eq!(events[0]["type"], "Error");
            assert!(events[0]["error"].as_str().unwrap().contains("bad key"));

            // nothing was committed
            let stored = app
                .oneshot(
                    Request::builder()
                        .uri("/threads/broken")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(stored.status(), StatusCode::NOT_FOUND);
        }

        #[tokio::test]
        async fn test_malformed_body_is_rejected() {
            let app = app(MockProvider::new(vec![]));
            let response = app
                .oneshot(reply_request(json!({"threadId": "x"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }
}
