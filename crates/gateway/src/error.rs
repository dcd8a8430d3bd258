//! Mapping of domain errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ragway_core::error::{AgentError, ExtractionError, ProviderError, ToolError, ValidationError};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    /// Raw model output, attached to schema violations for diagnosis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

/// Any error a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Request body too large: {0}")]
    TooLarge(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Agent(AgentError::Validation(e))
    }
}

fn upstream_status(e: &ProviderError) -> StatusCode {
    if e.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Agent(e) => match e {
                AgentError::Validation(_) => StatusCode::BAD_REQUEST,
                AgentError::Tool(ToolError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
                AgentError::Tool(_) => StatusCode::BAD_GATEWAY,
                AgentError::Upstream(p) => upstream_status(p),
                AgentError::EmptyFinalAnswer => StatusCode::BAD_GATEWAY,
                AgentError::LoopBudgetExceeded { .. } | AgentError::Cancelled => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Extraction(e) => match e {
                ExtractionError::Validation(_) => StatusCode::BAD_REQUEST,
                ExtractionError::SchemaViolation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ExtractionError::Upstream(p) => upstream_status(p),
            },
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self, "Request failed");
        }

        let raw = match &self {
            Self::Extraction(ExtractionError::SchemaViolation { raw, .. }) => raw.clone(),
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                raw,
            }),
        )
            .into_response()
    }
}
