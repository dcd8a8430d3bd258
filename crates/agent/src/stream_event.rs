//! Agent-level events.
//!
//! The loop emits `AgentEvent`s in order as it runs; projectors turn that
//! sequence into a client response (a token stream or a transcript).

use ragway_core::error::AgentError;
use ragway_core::message::{Message, ToolCall};

/// The classification of one completed model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// No tool calls: the text is the answer.
    FinalAnswer(String),

    /// The model asked for tools; `content` is any deliberation text it
    /// produced alongside the calls.
    ToolRequest { content: String, calls: Vec<ToolCall> },
}

impl ModelTurn {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer(_))
    }
}

/// Events emitted by the agent loop, in the order they occur.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Partial text from the model, before the turn is classified.
    ModelTokenDelta { text: String },

    /// The current model turn finished streaming.
    TurnCompleted { turn: ModelTurn },

    /// A tool call was dispatched.
    ToolCallStarted { call: ToolCall },

    /// A tool call settled successfully.
    ToolObservation {
        call_id: String,
        name: String,
        output: String,
    },

    /// The loop reached `Done`.
    LoopTerminated { final_message: Message },

    /// The loop reached `Failed`.
    LoopFailed { error: AgentError },
}

impl AgentEvent {
    /// Short name for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ModelTokenDelta { .. } => "model_token_delta",
            Self::TurnCompleted { .. } => "turn_completed",
            Self::ToolCallStarted { .. } => "tool_call_started",
            Self::ToolObservation { .. } => "tool_observation",
            Self::LoopTerminated { .. } => "loop_terminated",
            Self::LoopFailed { .. } => "loop_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::LoopTerminated { .. } | Self::LoopFailed { .. })
    }
}
