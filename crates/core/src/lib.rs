//! # Ragway Core
//!
//! Domain types, traits, and error definitions for the Ragway
//! retrieval-agent gateway. This crate has **zero framework dependencies**;
//! it defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (completion service, tools, vector store)
//! is defined as a trait here. Implementations live in their respective
//! crates, which keeps the agent loop testable with scripted mocks.

pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod tool;
pub mod wire;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, ExtractionError, ProviderError, RetrievalError, ToolError, ValidationError};
pub use message::{Message, Role, ToolCall};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use retrieval::{Passage, Retriever};
pub use tool::{Tool, ToolRegistry, ToolResult};
pub use wire::{WireMessage, WireToolCall};
