//! Retriever trait: the contract with the vector similarity store.
//!
//! The gateway never looks inside the index; it only asks for the top-k
//! passages most similar to a query string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A ranked text passage returned by a retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// The passage text
    pub content: String,

    /// Similarity score (higher is closer)
    #[serde(default)]
    pub score: f32,

    /// Source metadata carried through from ingestion
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Passage {
    pub fn new(content: impl Into<String>, score: f32) -> Self {
        Self {
            content: content.into(),
            score,
            metadata: serde_json::Map::new(),
        }
    }
}

/// The core Retriever trait.
///
/// Implementations: Supabase `match_documents`, in-memory (for testing).
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The backend name (e.g., "supabase", "in_memory").
    fn name(&self) -> &str;

    /// Return at most `top_k` passages ordered by descending similarity.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, RetrievalError>;
}
