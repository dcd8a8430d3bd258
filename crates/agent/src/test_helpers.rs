//! Shared test helpers: a scripted provider and a handful of mock tools.

use async_trait::async_trait;
use ragway_core::error::{ProviderError, ToolError};
use ragway_core::message::{Message, ToolCall};
use ragway_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallChunk, Usage,
};
use ragway_core::tool::Tool;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

/// One scripted model turn.
pub enum ScriptedTurn {
    Reply {
        deltas: Vec<String>,
        calls: Vec<ToolCall>,
    },
    Fail(ProviderError),
    /// Never produces a response.
    Hang,
}

/// A mock provider that plays back a sequence of scripted turns.
///
/// Each call to `stream` or `complete` consumes the next turn and records
/// the request. An exhausted script yields an `InvalidResponse` error.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose only turn is the given answer, streamed word by word.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![text_turn(text)])
    }

    /// A provider that requests `calls` on every turn, forever.
    pub fn always_tools(calls: Vec<ToolCall>, turns: usize) -> Self {
        Self::new(
            (0..turns)
                .map(|_| tool_turn("", calls.clone()))
                .collect(),
        )
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_turn(&self, request: ProviderRequest) -> ScriptedTurn {
        self.requests.lock().unwrap().push(request);
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                ScriptedTurn::Fail(ProviderError::InvalidResponse("script exhausted".into()))
            })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.next_turn(request) {
            ScriptedTurn::Reply { deltas, calls } => Ok(ProviderResponse {
                message: Message::assistant_tool_calls(deltas.concat(), calls),
                usage: Some(mock_usage()),
                model: "mock-model".into(),
            }),
            ScriptedTurn::Fail(e) => Err(e),
            ScriptedTurn::Hang => std::future::pending().await,
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let (deltas, calls) = match self.next_turn(request) {
            ScriptedTurn::Reply { deltas, calls } => (deltas, calls),
            ScriptedTurn::Fail(e) => return Err(e),
            ScriptedTurn::Hang => std::future::pending().await,
        };

        let (tx, rx) = mpsc::channel(deltas.len() + 1);
        for text in deltas {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(text),
                    ..StreamChunk::default()
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                tool_calls: calls
                    .into_iter()
                    .map(|tc| ToolCallChunk {
                        id: tc.id,
                        name: tc.name,
                        arguments: tc.arguments.to_string(),
                    })
                    .collect(),
                done: true,
                usage: Some(mock_usage()),
            }))
            .await;
        Ok(rx)
    }
}

fn mock_usage() -> Usage {
    Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    }
}

/// A final-answer turn streamed as whitespace-preserving word deltas.
pub fn text_turn(text: &str) -> ScriptedTurn {
    ScriptedTurn::Reply {
        deltas: text.split_inclusive(' ').map(String::from).collect(),
        calls: Vec::new(),
    }
}

/// A tool-request turn with optional deliberation text.
pub fn tool_turn(thought: &str, calls: Vec<ToolCall>) -> ScriptedTurn {
    ScriptedTurn::Reply {
        deltas: if thought.is_empty() {
            Vec::new()
        } else {
            vec![thought.to_string()]
        },
        calls,
    }
}

pub fn make_tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args,
    }
}

/// Returns a fixed output after an optional delay and counts invocations.
pub struct StaticTool {
    name: String,
    output: String,
    delay: Duration,
    pub invocations: AtomicUsize,
}

impl StaticTool {
    pub fn new(name: &str, output: &str) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            delay: Duration::ZERO,
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Returns a fixed observation"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.output.clone())
    }
}

/// Fails after an optional delay.
pub struct FailingTool {
    name: String,
    delay: Duration,
}

impl FailingTool {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Always fails"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        tokio::time::sleep(self.delay).await;
        Err(ToolError::Unavailable {
            tool_name: self.name.clone(),
            reason: "vector store unreachable".into(),
        })
    }
}

/// Blocks until cancelled; records whether it was dropped before finishing.
pub struct BlockingTool {
    name: String,
    pub started: Arc<Notify>,
    pub cancelled: Arc<AtomicBool>,
}

impl BlockingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            started: Arc::new(Notify::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

struct CancelFlag {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for CancelFlag {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Tool for BlockingTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Never finishes on its own"
    }
    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        let mut guard = CancelFlag {
            flag: self.cancelled.clone(),
            armed: true,
        };
        self.started.notify_one();
        tokio::time::sleep(Duration::from_secs(3600)).await;
        guard.armed = false;
        Ok("finished".into())
    }
}
