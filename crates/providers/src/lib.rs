//! LLM provider implementations for Ragway.
//!
//! All providers implement the `ragway_core::Provider` trait. The gateway
//! talks to a single OpenAI-compatible endpoint (DashScope by default).

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
