//! Message domain types.
//!
//! These are the core value objects that flow through the agent:
//! the client history is translated into `Message`s, the loop appends
//! tool-call requests and observations, and the projector turns the
//! result back into a transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::ValidationError;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The language model
    Assistant,
    /// System instructions (persona, rules)
    System,
    /// Tool observation
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Tool => "tool",
        }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within the enclosing message sequence (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments matching the tool's declared schema
    pub arguments: serde_json::Value,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// If this is a tool observation, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool observation message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

/// Check that every tool observation answers a tool call emitted earlier
/// in the same sequence.
pub fn validate_history(messages: &[Message]) -> Result<(), ValidationError> {
    let mut issued: HashSet<&str> = HashSet::new();

    for (index, msg) in messages.iter().enumerate() {
        issued.extend(msg.tool_calls.iter().map(|tc| tc.id.as_str()));

        if msg.role == Role::Tool {
            let id = msg
                .tool_call_id
                .as_deref()
                .ok_or(ValidationError::MissingToolCallId { index })?;
            if !issued.contains(id) {
                return Err(ValidationError::UnknownToolCall {
                    index,
                    tool_call_id: id.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Drop tool-call metadata that has no matching observation.
///
/// Replayed client history keeps assistant tool calls for display, but
/// completion APIs reject a tool call that is never answered.
pub fn strip_unanswered_tool_calls(messages: &[Message]) -> Vec<Message> {
    let answered: HashSet<&str> = messages
        .iter()
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();

    messages
        .iter()
        .map(|m| {
            if m.tool_calls.iter().all(|tc| answered.contains(tc.id.as_str())) {
                return m.clone();
            }
            let mut pruned = m.clone();
            pruned
                .tool_calls
                .retain(|tc| answered.contains(tc.id.as_str()));
            pruned
        })
        .collect()
}
