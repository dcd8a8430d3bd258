//! Event stream projection.
//!
//! Turns the loop's `AgentEvent` sequence into what the client sees:
//!
//! - **Stream mode** writes only final-answer text. Tokens of each model
//!   turn are held in a `TurnBuffer` until the turn is classified, then
//!   committed (final answer) or discarded (tool request).
//! - **Full mode** collects the complete ordered transcript, including
//!   tool requests and observations.

use futures::StreamExt;
use futures::stream::BoxStream;
use ragway_core::error::AgentError;
use ragway_core::message::{Message, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::loop_runner::AbortOnDrop;
use crate::stream_event::{AgentEvent, ModelTurn};

/// How the gateway answers a retrieval-agent request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Final answer text only, streamed as it is committed.
    #[default]
    Stream,
    /// The whole transcript as one JSON response.
    Full,
}

/// Token buffer for one model turn with deferred commit.
#[derive(Debug, Default)]
pub struct TurnBuffer {
    pending: Vec<String>,
}

impl TurnBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: String) {
        self.pending.push(text);
    }

    /// Take the buffered deltas, in arrival order, for replay.
    pub fn commit(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }

    pub fn discard(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Project events into final-answer text on `out`.
///
/// On failure the error is also sent on `out`, after which the output is
/// closed. Nothing buffered for the failed turn is ever written.
pub async fn project_stream(
    mut events: mpsc::Receiver<AgentEvent>,
    out: mpsc::Sender<Result<String, AgentError>>,
) -> Result<(), AgentError> {
    let result = stream_answer(&mut events, &out).await;
    if let Err(e) = &result {
        let _ = out.send(Err(e.clone())).await;
    }
    result
}

async fn stream_answer(
    events: &mut mpsc::Receiver<AgentEvent>,
    out: &mpsc::Sender<Result<String, AgentError>>,
) -> Result<(), AgentError> {
    let mut buffer = TurnBuffer::new();
    let mut committed_any = false;

    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::ModelTokenDelta { text } => buffer.push(text),
            AgentEvent::TurnCompleted { turn } => match turn {
                ModelTurn::FinalAnswer(_) => {
                    for text in buffer.commit() {
                        committed_any = true;
                        if out.send(Ok(text)).await.is_err() {
                            debug!("Output receiver dropped during commit");
                            return Err(AgentError::Cancelled);
                        }
                    }
                }
                ModelTurn::ToolRequest { .. } => buffer.discard(),
            },
            AgentEvent::ToolCallStarted { .. } | AgentEvent::ToolObservation { .. } => {}
            AgentEvent::LoopTerminated { .. } => {
                return if committed_any {
                    Ok(())
                } else {
                    Err(AgentError::EmptyFinalAnswer)
                };
            }
            AgentEvent::LoopFailed { error } => {
                buffer.discard();
                return Err(error);
            }
        }
    }

    Err(AgentError::Cancelled)
}

/// The ordered message list of a completed run.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub messages: Vec<Message>,
}

impl Transcript {
    /// Content of the last assistant message without tool calls.
    pub fn final_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.tool_calls.is_empty())
            .map(|m| m.content.as_str())
    }
}

/// Project events into a transcript that starts with `history`.
pub async fn project_full(
    history: Vec<Message>,
    mut events: mpsc::Receiver<AgentEvent>,
) -> Result<Transcript, AgentError> {
    let mut messages = history;

    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::TurnCompleted {
                turn: ModelTurn::ToolRequest { content, calls },
            } => messages.push(Message::assistant_tool_calls(content, calls)),
            AgentEvent::ToolObservation {
                call_id, output, ..
            } => messages.push(Message::tool_result(call_id, output)),
            AgentEvent::LoopTerminated { final_message } => {
                messages.push(final_message);
                return Ok(Transcript { messages });
            }
            AgentEvent::LoopFailed { error } => return Err(error),
            _ => {}
        }
    }

    Err(AgentError::Cancelled)
}

/// A stream-mode run in progress.
///
/// Yields committed final-answer text, then at most one error. Dropping it
/// aborts the loop and projector tasks.
pub struct AgentStream {
    rx: mpsc::Receiver<Result<String, AgentError>>,
    _guard: AbortOnDrop,
}

impl AgentStream {
    pub(crate) fn new(rx: mpsc::Receiver<Result<String, AgentError>>, guard: AbortOnDrop) -> Self {
        Self { rx, _guard: guard }
    }

    pub async fn next(&mut self) -> Option<Result<String, AgentError>> {
        self.rx.recv().await
    }

    /// Drain the stream into one string, stopping at the first error.
    pub async fn collect_text(mut self) -> Result<String, AgentError> {
        let mut text = String::new();
        while let Some(item) = self.next().await {
            text.push_str(&item?);
        }
        Ok(text)
    }

    /// Adapt into a `futures::Stream`, keeping the abort guard alive.
    pub fn into_stream(self) -> BoxStream<'static, Result<String, AgentError>> {
        futures::stream::unfold(self, |mut s| async move {
            let item = s.next().await?;
            Some((item, s))
        })
        .boxed()
    }
}
