//! Plain conversational chat: no tools, no persona loop.
//!
//! Earlier turns are flattened into `role: content` lines inside a prompt
//! template; the last message is the current input. The model's reply is
//! streamed straight through.

use futures::StreamExt;
use futures::stream::BoxStream;
use ragway_config::AppConfig;
use ragway_core::error::{AgentError, ValidationError};
use ragway_core::message::Message;
use ragway_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use tracing::info;

const CHAT_PERSONA: &str = "你是我的智能助手，我需要你回答我的问题。";

pub struct ChatResponder {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
}

impl ChatResponder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, config.default_model.clone(), config.chat_temperature)
    }

    /// Stream the reply to the last message of `history`.
    pub async fn stream(
        &self,
        history: &[Message],
    ) -> Result<BoxStream<'static, Result<String, AgentError>>, AgentError> {
        let prompt = render_prompt(history)?;

        let mut request = ProviderRequest::new(self.model.clone(), vec![Message::user(prompt)]);
        request.temperature = self.temperature;
        request.stream = true;

        info!(model = %self.model, turns = history.len(), "Plain chat request");

        let rx = self.provider.stream(request).await?;

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await? {
                    Ok(chunk) => match chunk.content.filter(|t| !t.is_empty()) {
                        Some(text) => return Some((Ok(text), rx)),
                        None if chunk.done => return None,
                        None => continue,
                    },
                    Err(e) => return Some((Err(AgentError::Upstream(e)), rx)),
                }
            }
        })
        .boxed())
    }
}

/// Fill the chat template from a message history.
pub fn render_prompt(history: &[Message]) -> Result<String, ValidationError> {
    let (current, previous) = history.split_last().ok_or(ValidationError::EmptyHistory)?;

    let chat_history = previous
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!(
        "{CHAT_PERSONA}\n\nCurrent conversation:\n{chat_history}\n\nUser: {}\nAI:",
        current.content
    ))
}
