//! Chat API handlers.
//!
//! - `POST /api/chat/retrieval_agents` runs the retrieval agent, streamed
//!   as plain text or returned as a full transcript
//! - `POST /api/chat` plain streamed chat without tools
//! - `POST /api/chat/structured_output` schema-constrained extraction

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use futures::stream::BoxStream;
use ragway_agent::{Extraction, ExecutionMode};
use ragway_core::error::{AgentError, ValidationError};
use ragway_core::message::Message;
use ragway_core::wire::{WireMessage, to_internal, to_wire};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::SharedState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    #[serde(default)]
    pub messages: Vec<WireMessage>,

    #[serde(default)]
    pub mode: Option<ExecutionMode>,

    /// Legacy switch for full mode; `mode` wins when both are given
    #[serde(default)]
    pub show_intermediate_steps: Option<bool>,
}

impl AgentRequest {
    pub fn mode(&self) -> ExecutionMode {
        match (self.mode, self.show_intermediate_steps) {
            (Some(mode), _) => mode,
            (None, Some(true)) => ExecutionMode::Full,
            (None, _) => ExecutionMode::Stream,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractionRequest {
    #[serde(default)]
    pub input: Option<String>,

    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

impl ExtractionRequest {
    /// `input` if given, otherwise the content of the last message.
    fn input_text(&self) -> Option<&str> {
        self.input
            .as_deref()
            .or_else(|| self.messages.last().and_then(|m| m.content.as_deref()))
    }
}

fn malformed(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::TooLarge(rejection.body_text());
    }
    ValidationError::Malformed(rejection.body_text()).into()
}

fn translate(wire: &[WireMessage]) -> Result<Vec<Message>, ApiError> {
    let history = to_internal(wire)?;
    if history.is_empty() {
        return Err(ValidationError::EmptyHistory.into());
    }
    Ok(history)
}

/// Turn a text stream into a chunked `text/plain` response.
///
/// The first item is awaited before the response starts, so a run that
/// fails before producing any text still gets a proper error status.
/// Later errors can only end the body early.
async fn text_response(
    mut stream: BoxStream<'static, Result<String, AgentError>>,
) -> Result<Response, ApiError> {
    let first = match stream.next().await {
        Some(Ok(text)) => text,
        Some(Err(e)) => return Err(e.into()),
        None => String::new(),
    };

    let body = futures::stream::once(async move { Ok(first) })
        .chain(stream)
        .map(|item| {
            item.map(Bytes::from).inspect_err(|e| {
                warn!(error = %e, "Stream failed after the response started");
            })
        });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

pub async fn retrieval_agent_handler(
    State(state): State<SharedState>,
    payload: Result<Json<AgentRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(malformed)?;
    let mode = request.mode();
    let history = translate(&request.messages)?;

    info!(mode = ?mode, messages = history.len(), "Retrieval agent request");

    match mode {
        ExecutionMode::Full => {
            let transcript = state.agent.run(history).await?;
            Ok(Json(TranscriptResponse {
                messages: to_wire(&transcript.messages),
            })
            .into_response())
        }
        ExecutionMode::Stream => text_response(state.agent.stream(history).into_stream()).await,
    }
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(malformed)?;
    let history = translate(&request.messages)?;
    let stream = state.chat.stream(&history).await?;
    text_response(stream).await
}

pub async fn structured_output_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ExtractionRequest>, JsonRejection>,
) -> Result<Json<Extraction>, ApiError> {
    let Json(request) = payload.map_err(malformed)?;
    let input = request.input_text().ok_or(ValidationError::MissingInput)?;
    Ok(Json(state.extractor.extract(input).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GatewayState, build_router};
    use async_trait::async_trait;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use ragway_agent::{AgentLoop, AgentSettings, ChatResponder, Extractor};
    use ragway_core::error::{ProviderError, RetrievalError};
    use ragway_core::message::ToolCall;
    use ragway_core::provider::{Provider, ProviderRequest, ProviderResponse};
    use ragway_core::retrieval::{Passage, Retriever};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Replays a fixed list of assistant messages, one per completion call.
    struct MockProvider {
        replies: Mutex<VecDeque<Message>>,
    }

    impl MockProvider {
        fn new(replies: Vec<Message>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let message = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ProviderError::Network("script exhausted".into()))?;
            Ok(ProviderResponse {
                message,
                usage: None,
                model: "mock-model".into(),
            })
        }
    }

    struct MockRetriever {
        fail: bool,
    }

    #[async_trait]
    impl Retriever for MockRetriever {
        fn name(&self) -> &str {
            "mock"
        }

        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
            if self.fail {
                return Err(RetrievalError::Unreachable("connection refused".into()));
            }
            Ok(vec![Passage::new("Rust 1.88 was released in June 2025.", 0.9)])
        }
    }

    fn search_call(id: &str) -> Message {
        Message::assistant_tool_calls(
            "",
            vec![ToolCall {
                id: id.into(),
                name: "search_latest_knowledge".into(),
                arguments: serde_json::json!({"query": "latest Rust release"}),
            }],
        )
    }

    fn app_with(replies: Vec<Message>, retriever_fails: bool, max_tool_iterations: u32) -> axum::Router {
        let provider = MockProvider::new(replies);
        let tools = ragway_tools::default_registry(
            Arc::new(MockRetriever {
                fail: retriever_fails,
            }),
            1,
            Duration::from_secs(5),
        );
        let settings = AgentSettings {
            max_tool_iterations,
            ..AgentSettings::default()
        };

        let state = Arc::new(GatewayState {
            agent: AgentLoop::new(provider.clone(), Arc::new(tools), settings),
            chat: ChatResponder::new(provider.clone(), "mock-model", 0.8),
            extractor: Extractor::new(provider, "mock-model", 0.8),
            max_body_bytes: 64 * 1024,
        });
        build_router(state)
    }

    fn app(replies: Vec<Message>) -> axum::Router {
        app_with(replies, false, 10)
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn question() -> serde_json::Value {
        serde_json::json!({
            "messages": [{"role": "user", "content": "What is the latest Rust release?"}]
        })
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let response = app(vec![])
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn stream_mode_returns_only_final_answer() {
        let app = app(vec![search_call("call_1"), Message::assistant("Rust 1.88 is the latest.")]);

        let response = app
            .oneshot(post("/api/chat/retrieval_agents", question()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert_eq!(body_text(response).await, "Rust 1.88 is the latest.");
    }

    #[tokio::test]
    async fn full_mode_returns_transcript() {
        let app = app(vec![search_call("call_1"), Message::assistant("Rust 1.88 is the latest.")]);

        let mut body = question();
        body["mode"] = "full".into();
        let response = app
            .oneshot(post("/api/chat/retrieval_agents", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let messages = json["messages"].as_array().unwrap();
        let roles: Vec<&str> = messages.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["user", "assistant", "tool", "assistant"]);
        assert_eq!(messages[1]["tool_calls"][0]["name"], "search_latest_knowledge");
        assert_eq!(messages[2]["tool_call_id"], "call_1");
        assert!(messages[2]["content"].as_str().unwrap().contains("Rust 1.88"));
        assert_eq!(messages[3]["content"], "Rust 1.88 is the latest.");
    }

    #[tokio::test]
    async fn legacy_flag_selects_full_mode() {
        let app = app(vec![Message::assistant("Hello!")]);

        let mut body = question();
        body["show_intermediate_steps"] = true.into();
        let response = app
            .oneshot(post("/api/chat/retrieval_agents", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn explicit_mode_overrides_legacy_flag() {
        let request: AgentRequest = serde_json::from_value(serde_json::json!({
            "messages": [],
            "mode": "stream",
            "show_intermediate_steps": true
        }))
        .unwrap();
        assert_eq!(request.mode(), ExecutionMode::Stream);
    }

    #[tokio::test]
    async fn client_tool_messages_are_not_replayed() {
        let app = app(vec![Message::assistant("Sure.")]);

        let body = serde_json::json!({
            "mode": "full",
            "messages": [
                {"role": "user", "content": "Hi"},
                {"role": "tool", "content": "stale observation", "tool_call_id": "old"},
                {"role": "user", "content": "Again"}
            ]
        });
        let response = app
            .oneshot(post("/api/chat/retrieval_agents", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let roles: Vec<&str> = json["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "user", "assistant"]);
    }

    #[tokio::test]
    async fn missing_content_is_bad_request() {
        let body = serde_json::json!({"messages": [{"role": "user"}]});
        let response = app(vec![])
            .oneshot(post("/api/chat/retrieval_agents", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("content"));
    }

    #[tokio::test]
    async fn empty_history_is_bad_request() {
        let response = app(vec![])
            .oneshot(post("/api/chat/retrieval_agents", serde_json::json!({"messages": []})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat/retrieval_agents")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app(vec![]).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let body = serde_json::json!({
            "messages": [{"role": "user", "content": "x".repeat(128 * 1024)}]
        });
        let response = app(vec![])
            .oneshot(post("/api/chat/retrieval_agents", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn budget_exhaustion_is_server_error() {
        let app = app_with(vec![search_call("call_1"), search_call("call_2")], false, 1);

        let response = app
            .oneshot(post("/api/chat/retrieval_agents", question()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("1 tool iterations"));
    }

    #[tokio::test]
    async fn retrieval_failure_is_bad_gateway() {
        let app = app_with(vec![search_call("call_1")], true, 10);

        let response = app
            .oneshot(post("/api/chat/retrieval_agents", question()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn empty_final_answer_in_stream_mode_is_error() {
        let response = app(vec![Message::assistant("")])
            .oneshot(post("/api/chat/retrieval_agents", question()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn plain_chat_streams_reply() {
        let body = serde_json::json!({
            "messages": [
                {"role": "user", "content": "Hi"},
                {"role": "assistant", "content": "Hello!"},
                {"role": "user", "content": "Tell me a joke"}
            ]
        });
        let response = app(vec![Message::assistant("Why did the crab never share?")])
            .oneshot(post("/api/chat", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Why did the crab never share?");
    }

    #[tokio::test]
    async fn plain_chat_upstream_failure_is_bad_gateway() {
        let response = app(vec![])
            .oneshot(post("/api/chat", question()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    fn formatter_reply(args: serde_json::Value) -> Message {
        Message::assistant_tool_calls(
            "",
            vec![ToolCall {
                id: "call_fmt".into(),
                name: ragway_agent::extraction::FORMATTER_TOOL.into(),
                arguments: args,
            }],
        )
    }

    #[tokio::test]
    async fn structured_output_returns_record() {
        let app = app(vec![formatter_reply(serde_json::json!({
            "tone": "positive",
            "entity": "Acme",
            "word_count": 8,
            "chat_response": "Glad you love it!",
            "final_punctuation": "!"
        }))]);

        let body = serde_json::json!({"input": "I love this product, made by Acme, amazing!"});
        let response = app
            .oneshot(post("/api/chat/structured_output", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["tone"], "positive");
        assert_eq!(json["entity"], "Acme");
        assert_eq!(json["word_count"], 8);
    }

    #[tokio::test]
    async fn structured_output_reads_last_message() {
        let app = app(vec![formatter_reply(serde_json::json!({
            "tone": "neutral",
            "entity": "Globex",
            "word_count": 2,
            "chat_response": "Okay"
        }))]);

        let body = serde_json::json!({
            "messages": [{"role": "user", "content": "Globex exists"}]
        });
        let response = app
            .oneshot(post("/api/chat/structured_output", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["entity"], "Globex");
        assert!(json.get("final_punctuation").is_none());
    }

    #[tokio::test]
    async fn structured_output_schema_violation_is_unprocessable() {
        let app = app(vec![formatter_reply(serde_json::json!({
            "tone": "ecstatic",
            "entity": "Acme",
            "word_count": 8,
            "chat_response": "Yay"
        }))]);

        let response = app
            .oneshot(post(
                "/api/chat/structured_output",
                serde_json::json!({"input": "Acme rocks"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert!(json["raw"].as_str().unwrap().contains("ecstatic"));
    }

    #[tokio::test]
    async fn structured_output_without_input_is_bad_request() {
        let response = app(vec![])
            .oneshot(post("/api/chat/structured_output", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
