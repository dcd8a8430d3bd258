//! Configuration loading, validation, and management for Ragway.
//!
//! Loads configuration from `~/.ragway/config.toml` with environment
//! variable overrides. Validates all settings at startup. Nothing here is
//! global: the loaded `AppConfig` is passed into gateway construction.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder value shipped in sample env files; treated as "no key".
const PLACEHOLDER_API_KEY: &str = "YOUR_API_KEY";

/// The root configuration structure.
///
/// Maps directly to `~/.ragway/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible base endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default chat model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Temperature for the tool-calling agent
    #[serde(default = "default_agent_temperature")]
    pub agent_temperature: f32,

    /// Temperature for the plain chat route
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    /// Temperature for structured extraction
    #[serde(default = "default_chat_temperature")]
    pub extraction_temperature: f32,

    /// Optional cap on tokens per completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Vector store configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".into()
}
fn default_model() -> String {
    "qwen-turbo".into()
}
fn default_agent_temperature() -> f32 {
    0.2
}
fn default_chat_temperature() -> f32 {
    0.8
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("agent_temperature", &self.agent_temperature)
            .field("chat_temperature", &self.chat_temperature)
            .field("extraction_temperature", &self.extraction_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("retrieval", &self.retrieval)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum tool-call rounds per request (safety valve)
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Per tool call timeout
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Per completion turn timeout
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,

    /// Persona prompt prepended to every agent request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_tool_iterations() -> u32 {
    10
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_completion_timeout_secs() -> u64 {
    120
}
fn default_system_prompt() -> String {
    "You are a stereotypical robot named Robbie and must answer all questions like a stereotypical robot. \
Use lots of interjections like \"BEEP\" and \"BOOP\".\n\n\
If you don't know how to answer a question, use the available tools to look up relevant information. \
You should particularly do this for questions about LangChain."
        .into()
}

impl AgentConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion_timeout_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            completion_timeout_secs: default_completion_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Which vector store backs the retrieval tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalBackend {
    Supabase,
    Memory,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_backend")]
    pub backend: RetrievalBackend,

    /// Passages returned per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_key: Option<String>,

    /// Table the `query_name` function searches. Informational only: the
    /// RPC function is bound to its table, so this value is just reported
    /// in startup logs.
    #[serde(default = "default_table")]
    pub table: String,

    /// Postgres function called over `/rest/v1/rpc/`
    #[serde(default = "default_query_name")]
    pub query_name: String,

    /// Embedding model; derived from the base URL when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
}

fn default_retrieval_backend() -> RetrievalBackend {
    RetrievalBackend::Supabase
}
fn default_top_k() -> usize {
    1
}
fn default_table() -> String {
    "documents".into()
}
fn default_query_name() -> String {
    "match_documents".into()
}

impl std::fmt::Debug for RetrievalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalConfig")
            .field("backend", &self.backend)
            .field("top_k", &self.top_k)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &redact(&self.supabase_key))
            .field("table", &self.table)
            .field("query_name", &self.query_name)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            top_k: default_top_k(),
            supabase_url: None,
            supabase_key: None,
            table: default_table(),
            query_name: default_query_name(),
            embedding_model: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Request body limit in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragway/config.toml).
    ///
    /// Environment variables override the file:
    /// - `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `QWEN_MODEL`
    /// - `OPENAI_EMBEDDING_MODEL`
    /// - `SUPABASE_URL`, `SUPABASE_PRIVATE_KEY`
    /// - `RAGWAY_MAX_TOOL_ITERATIONS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = var("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if self.api_key.as_deref() == Some(PLACEHOLDER_API_KEY) {
            self.api_key = None;
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = var("QWEN_MODEL") {
            self.default_model = model;
        }
        if let Some(model) = var("OPENAI_EMBEDDING_MODEL") {
            self.retrieval.embedding_model = Some(model);
        }
        if let Some(url) = var("SUPABASE_URL") {
            self.retrieval.supabase_url = Some(url);
        }
        if let Some(key) = var("SUPABASE_PRIVATE_KEY") {
            self.retrieval.supabase_key = Some(key);
        }
        if let Some(raw) = var("RAGWAY_MAX_TOOL_ITERATIONS") {
            self.agent.max_tool_iterations = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "RAGWAY_MAX_TOOL_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragway")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, t) in [
            ("agent_temperature", self.agent_temperature),
            ("chat_temperature", self.chat_temperature),
            ("extraction_temperature", self.extraction_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.agent.max_tool_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_iterations must be at least 1".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The embedding model to use for query embeddings.
    pub fn embedding_model(&self) -> String {
        if let Some(model) = &self.retrieval.embedding_model {
            return model.clone();
        }
        if self.base_url.contains("dashscope") {
            "text-embedding-v3".into()
        } else {
            "text-embedding-ada-002".into()
        }
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_model: default_model(),
            agent_temperature: default_agent_temperature(),
            chat_temperature: default_chat_temperature(),
            extraction_temperature: default_chat_temperature(),
            max_tokens: None,
            agent: AgentConfig::default(),
            retrieval: RetrievalConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
