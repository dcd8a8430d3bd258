//! The agent reasoning loop implementation.
//!
//! A ReAct state machine: `Thinking` submits the history to the model;
//! a tool request moves to `AwaitingToolResults`, which dispatches every
//! call concurrently and returns to `Thinking`; a plain answer ends the
//! loop. Progress is reported as `AgentEvent`s over a bounded channel.

use futures::future::try_join_all;
use ragway_config::AppConfig;
use ragway_core::error::{AgentError, ProviderError, ToolError};
use ragway_core::message::{Message, ToolCall, strip_unanswered_tool_calls, validate_history};
use ragway_core::provider::{Provider, ProviderRequest, ToolCallChunk, ToolDefinition};
use ragway_core::tool::{ToolRegistry, ToolResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::projector::{AgentStream, Transcript, project_full, project_stream};
use crate::stream_event::{AgentEvent, ModelTurn};

/// Capacity of the loop → projector event channel.
const EVENT_BUFFER: usize = 64;

/// Capacity of the projector → client output channel.
const OUTPUT_BUFFER: usize = 16;

/// Per-request loop settings, built once from `AppConfig`.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,

    /// Tool rounds allowed before `LoopBudgetExceeded`
    pub max_tool_iterations: u32,
    pub tool_timeout: Duration,
    pub completion_timeout: Duration,

    /// Prepended to every request, never recorded in the transcript
    pub system_prompt: Option<String>,
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.agent_temperature,
            max_tokens: config.max_tokens,
            max_tool_iterations: config.agent.max_tool_iterations,
            tool_timeout: config.agent.tool_timeout(),
            completion_timeout: config.agent.completion_timeout(),
            system_prompt: Some(config.agent.system_prompt.clone()),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Why the loop stopped without reaching `Done`.
enum LoopExit {
    Failed(AgentError),
    /// The event receiver went away; nobody is listening.
    Disconnected,
}

impl From<AgentError> for LoopExit {
    fn from(e: AgentError) -> Self {
        Self::Failed(e)
    }
}

async fn emit(events: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<(), LoopExit> {
    events.send(event).await.map_err(|_| LoopExit::Disconnected)
}

/// Aborts the wrapped tasks when dropped.
pub struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// The core agent loop that orchestrates LLM calls and tool execution.
///
/// Cheap to clone; shared state is behind `Arc`s and read-only.
#[derive(Clone)]
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, settings: AgentSettings) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Run the loop to completion, emitting events as they occur.
    ///
    /// Always ends with exactly one terminal event unless the receiver is
    /// dropped first, in which case the loop stops at the next emit.
    pub async fn run_events(&self, history: Vec<Message>, events: mpsc::Sender<AgentEvent>) {
        info!(
            model = %self.settings.model,
            messages = history.len(),
            max_iterations = self.settings.max_tool_iterations,
            "Agent loop started"
        );

        match self.drive(history, &events).await {
            Ok(final_message) => {
                info!(chars = final_message.content.len(), "Agent loop finished");
                let _ = events.send(AgentEvent::LoopTerminated { final_message }).await;
            }
            Err(LoopExit::Failed(error)) => {
                warn!(error = %error, "Agent loop failed");
                let _ = events.send(AgentEvent::LoopFailed { error }).await;
            }
            Err(LoopExit::Disconnected) => {
                debug!("Event receiver dropped, stopping agent loop");
            }
        }
    }

    /// Run the loop in full mode: wait for the end and return the transcript.
    pub async fn run(&self, history: Vec<Message>) -> Result<Transcript, AgentError> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (_, transcript) = tokio::join!(
            self.run_events(history.clone(), tx),
            project_full(history, rx)
        );
        transcript
    }

    /// Run the loop in stream mode on background tasks.
    ///
    /// Dropping the returned stream aborts the loop, including any tool
    /// calls still in flight.
    pub fn stream(&self, history: Vec<Message>) -> AgentStream {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (out_tx, out_rx) = mpsc::channel(OUTPUT_BUFFER);

        let agent = self.clone();
        let loop_task = tokio::spawn(async move { agent.run_events(history, event_tx).await });
        let projector = tokio::spawn(async move {
            let _ = project_stream(event_rx, out_tx).await;
        });

        AgentStream::new(
            out_rx,
            AbortOnDrop(vec![loop_task.abort_handle(), projector.abort_handle()]),
        )
    }

    async fn drive(
        &self,
        mut history: Vec<Message>,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<Message, LoopExit> {
        validate_history(&history).map_err(AgentError::from)?;

        let tool_defs = self.tools.definitions();
        let max_iterations = self.settings.max_tool_iterations;

        // At most max_iterations tool rounds, so max_iterations + 1 model calls
        for iteration in 0..=max_iterations {
            debug!(iteration, "Agent thinking");

            let turn = self.think(&history, &tool_defs, events).await?;
            emit(events, AgentEvent::TurnCompleted { turn: turn.clone() }).await?;

            let (content, calls) = match turn {
                ModelTurn::FinalAnswer(text) => {
                    let final_message = Message::assistant(text);
                    history.push(final_message.clone());
                    return Ok(final_message);
                }
                ModelTurn::ToolRequest { content, calls } => (content, calls),
            };

            if iteration == max_iterations {
                break;
            }

            history.push(Message::assistant_tool_calls(content, calls.clone()));
            for call in &calls {
                emit(events, AgentEvent::ToolCallStarted { call: call.clone() }).await?;
            }

            let results = self.dispatch(&calls).await?;

            for (call, result) in calls.iter().zip(results) {
                history.push(Message::tool_result(&result.call_id, &result.output));
                emit(
                    events,
                    AgentEvent::ToolObservation {
                        call_id: result.call_id,
                        name: call.name.clone(),
                        output: result.output,
                    },
                )
                .await?;
            }
        }

        Err(AgentError::LoopBudgetExceeded { max_iterations }.into())
    }

    /// One `Thinking` step: stream a model turn and classify it.
    async fn think(
        &self,
        history: &[Message],
        tool_defs: &[ToolDefinition],
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<ModelTurn, LoopExit> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        if let Some(prompt) = &self.settings.system_prompt {
            messages.push(Message::system(prompt));
        }
        messages.extend(strip_unanswered_tool_calls(history));

        let request = ProviderRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            tools: tool_defs.to_vec(),
            tool_choice: None,
            stream: true,
        };

        let limit = self.settings.completion_timeout;
        tokio::time::timeout(limit, self.stream_turn(request, events))
            .await
            .map_err(|_| {
                LoopExit::from(AgentError::Upstream(ProviderError::Timeout(format!(
                    "model turn exceeded {}ms",
                    limit.as_millis()
                ))))
            })?
    }

    async fn stream_turn(
        &self,
        request: ProviderRequest,
        events: &mpsc::Sender<AgentEvent>,
    ) -> Result<ModelTurn, LoopExit> {
        let mut rx = self.provider.stream(request).await.map_err(AgentError::from)?;

        let mut content = String::new();
        let mut tool_chunks: Vec<ToolCallChunk> = Vec::new();

        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.map_err(AgentError::from)?;

            if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                content.push_str(&text);
                emit(events, AgentEvent::ModelTokenDelta { text }).await?;
            }

            for tc in chunk.tool_calls {
                // Fragments of one call share its id
                match tool_chunks
                    .iter_mut()
                    .find(|t| !tc.id.is_empty() && t.id == tc.id)
                {
                    Some(existing) => existing.arguments.push_str(&tc.arguments),
                    None => tool_chunks.push(tc),
                }
            }

            if chunk.done {
                break;
            }
        }

        Ok(classify_turn(content, tool_chunks)?)
    }

    /// `AwaitingToolResults`: run every call concurrently, fail fast.
    ///
    /// Results come back in call order regardless of completion order.
    /// The first failure drops the remaining futures.
    async fn dispatch(&self, calls: &[ToolCall]) -> Result<Vec<ToolResult>, AgentError> {
        let timeout = self.settings.tool_timeout;
        let pending = calls.iter().map(|call| async move {
            debug!(tool = %call.name, call_id = %call.id, "Dispatching tool call");
            self.tools.execute_with_timeout(call, timeout).await
        });

        try_join_all(pending).await.map_err(|e| {
            warn!(error = %e, "Tool call failed, aborting turn");
            AgentError::Tool(e)
        })
    }
}

/// Turn the accumulated stream into a `ModelTurn`.
fn classify_turn(content: String, tool_chunks: Vec<ToolCallChunk>) -> Result<ModelTurn, AgentError> {
    if tool_chunks.is_empty() {
        return Ok(ModelTurn::FinalAnswer(content));
    }

    let calls = tool_chunks
        .into_iter()
        .map(|tc| {
            let arguments = if tc.arguments.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&tc.arguments).map_err(|e| ToolError::InvalidArguments {
                    tool_name: tc.name.clone(),
                    reason: format!("arguments are not valid JSON: {e}"),
                })?
            };
            let id = if tc.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4().simple())
            } else {
                tc.id
            };
            Ok(ToolCall {
                id,
                name: tc.name,
                arguments,
            })
        })
        .collect::<Result<Vec<_>, ToolError>>()?;

    Ok(ModelTurn::ToolRequest { content, calls })
}
