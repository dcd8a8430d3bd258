//! Message translator between the client chat wire format and the
//! internal `Message` model.
//!
//! Inbound, only `user` and `assistant` messages survive: intermediate
//! tool and system messages a client echoes back must never be replayed
//! into history. Outbound, assistant tool-call metadata is attached so a
//! client can render the agent's intermediate steps.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::message::{Message, Role, ToolCall};

/// A chat message as exchanged with clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// `user`, `assistant`, `system`, `tool`, or any client-specific role
    pub role: String,

    /// Required; `None` only when the client omitted the field
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<WireToolCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl WireMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role: role.into(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// A tool call in the client's shape: `{ id, name, args }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, alias = "arguments")]
    pub args: serde_json::Value,
}

impl From<&ToolCall> for WireToolCall {
    fn from(tc: &ToolCall) -> Self {
        Self {
            id: tc.id.clone(),
            name: tc.name.clone(),
            args: tc.arguments.clone(),
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(tc: WireToolCall) -> Self {
        Self {
            id: tc.id,
            name: tc.name,
            arguments: tc.args,
        }
    }
}

/// Translate client history into internal messages.
///
/// Messages whose role is neither `user` nor `assistant` are dropped.
/// Fails with `MissingContent` on the first kept message without content.
pub fn to_internal(wire: &[WireMessage]) -> Result<Vec<Message>, ValidationError> {
    let mut messages = Vec::with_capacity(wire.len());

    for (index, w) in wire.iter().enumerate() {
        let role = match w.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => continue,
        };
        let content = w
            .content
            .clone()
            .ok_or(ValidationError::MissingContent { index })?;

        let tool_calls = if role == Role::Assistant {
            w.tool_calls.iter().cloned().map(ToolCall::from).collect()
        } else {
            Vec::new()
        };

        messages.push(Message {
            id: w.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
            role,
            content,
            tool_calls,
            tool_call_id: None,
            timestamp: Utc::now(),
        });
    }

    Ok(messages)
}

/// Translate internal messages into the client wire format.
pub fn to_wire(messages: &[Message]) -> Vec<WireMessage> {
    messages.iter().map(message_to_wire).collect()
}

fn message_to_wire(m: &Message) -> WireMessage {
    WireMessage {
        id: None,
        role: m.role.as_str().to_string(),
        content: Some(m.content.clone()),
        tool_calls: if m.role == Role::Assistant {
            m.tool_calls.iter().map(WireToolCall::from).collect()
        } else {
            Vec::new()
        },
        tool_call_id: if m.role == Role::Tool {
            m.tool_call_id.clone()
        } else {
            None
        },
    }
}
