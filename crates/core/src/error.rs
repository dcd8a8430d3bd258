//! Error types for the Ragway domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the agent and extraction
//! errors compose them with `#[from]`.

use thiserror::Error;

// --- Bounded context errors ---

/// Malformed client input. Always surfaced as a client error, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Message {index} is missing its content field")]
    MissingContent { index: usize },

    #[error("Request contains no messages")]
    EmptyHistory,

    #[error("Tool message {index} references unknown tool call '{tool_call_id}'")]
    UnknownToolCall { index: usize, tool_call_id: String },

    #[error("Tool message {index} has no tool_call_id")]
    MissingToolCallId { index: usize },

    #[error("Request has no input text")]
    MissingInput,

    #[error("Malformed request: {0}")]
    Malformed(String),
}

/// Failures of the completion service collaborator.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether this failure is a timeout rather than a hard upstream error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool {tool_name} unavailable: {reason}")]
    Unavailable { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// Failures of the vector similarity collaborator.
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Vector store unreachable: {0}")]
    Unreachable(String),

    #[error("Query embedding failed: {0}")]
    Embedding(String),

    #[error("Vector store returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Terminal error of an agent run (`Failed` state).
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] ProviderError),

    #[error("Agent exceeded {max_iterations} tool iterations without a final answer")]
    LoopBudgetExceeded { max_iterations: u32 },

    #[error("Agent finished without any answer content")]
    EmptyFinalAnswer,

    #[error("Agent run was cancelled")]
    Cancelled,
}

/// Failures of the structured-extraction variant.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] ProviderError),

    #[error("Model output violates the extraction schema: {reason}")]
    SchemaViolation { reason: String, raw: Option<String> },
}
