//! Structured extraction: a single schema-constrained completion.
//!
//! No loop, no tools, no events. The schema is offered to the model as a
//! forced `output_formatter` tool; its arguments are validated and
//! returned. A model that answers in plain content instead is accepted if
//! that content is (or contains a fenced) JSON object.

use ragway_config::AppConfig;
use ragway_core::error::{ExtractionError, ValidationError};
use ragway_core::message::Message;
use ragway_core::provider::{Provider, ProviderRequest, ToolDefinition};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const FORMATTER_TOOL: &str = "output_formatter";

const EXTRACTION_TEMPLATE: &str = "Extract the requested fields from the input and return them as a JSON object.

The field \"entity\" refers to the first mentioned entity in the input.

You must respond with valid JSON format only.

Input:

{input}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
}

/// The fixed extraction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub tone: Tone,
    pub entity: String,
    #[serde(deserialize_with = "whole_number")]
    pub word_count: u64,
    pub chat_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_punctuation: Option<String>,
}

impl Extraction {
    /// JSON Schema sent to the model as the formatter tool's parameters.
    pub fn json_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "description": "Should always be used to properly format output",
            "properties": {
                "tone": {
                    "type": "string",
                    "enum": ["positive", "negative", "neutral"],
                    "description": "The overall tone of the input"
                },
                "entity": {
                    "type": "string",
                    "description": "The entity mentioned in the input"
                },
                "word_count": {
                    "type": "integer",
                    "description": "The number of words in the input"
                },
                "chat_response": {
                    "type": "string",
                    "description": "A response to the human's input"
                },
                "final_punctuation": {
                    "type": "string",
                    "description": "The final punctuation mark in the input, if any."
                }
            },
            "required": ["tone", "entity", "word_count", "chat_response"]
        })
    }

    fn tool_definition() -> ToolDefinition {
        ToolDefinition {
            name: FORMATTER_TOOL.into(),
            description: "Should always be used to properly format output".into(),
            parameters: Self::json_schema(),
        }
    }
}

/// Accept any JSON number with no fractional part, so `8.0` reads as `8`.
fn whole_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let n = f64::deserialize(deserializer)?;
    if n >= 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64 {
        Ok(n as u64)
    } else {
        Err(de::Error::custom(format!(
            "expected a non-negative whole number, got {n}"
        )))
    }
}

/// Runs structured extraction against a provider.
pub struct Extractor {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
}

impl Extractor {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, config.default_model.clone(), config.extraction_temperature)
    }

    pub async fn extract(&self, input: &str) -> Result<Extraction, ExtractionError> {
        if input.trim().is_empty() {
            return Err(ValidationError::MissingInput.into());
        }

        let prompt = EXTRACTION_TEMPLATE.replace("{input}", input);
        let mut request = ProviderRequest::new(self.model.clone(), vec![Message::user(prompt)]);
        request.temperature = self.temperature;
        request.tools = vec![Extraction::tool_definition()];
        request.tool_choice = Some(FORMATTER_TOOL.into());

        info!(model = %self.model, chars = input.len(), "Running structured extraction");

        let response = self.provider.complete(request).await?;
        let message = response.message;

        let value = match message.tool_calls.into_iter().find(|tc| tc.name == FORMATTER_TOOL) {
            Some(call) => call.arguments,
            None => {
                debug!("Model answered without the formatter tool, parsing content");
                json_from_content(&message.content).ok_or_else(|| {
                    ExtractionError::SchemaViolation {
                        reason: "response contains no JSON object".into(),
                        raw: Some(message.content.clone()),
                    }
                })?
            }
        };

        validate(value)
    }
}

/// Check a raw value against the extraction schema.
pub fn validate(value: serde_json::Value) -> Result<Extraction, ExtractionError> {
    let raw = value.to_string();
    serde_json::from_value(value).map_err(|e| {
        warn!(error = %e, "Extraction output violates schema");
        ExtractionError::SchemaViolation {
            reason: e.to_string(),
            raw: Some(raw),
        }
    })
}

/// Find a JSON object in free text: bare, or inside a ``` fence.
fn json_from_content(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value @ serde_json::Value::Object(_)) = serde_json::from_str(body) {
        return Some(value);
    }

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&body[start..=end]) {
        Ok(value @ serde_json::Value::Object(_)) => Some(value),
        _ => None,
    }
}
