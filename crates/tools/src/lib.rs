//! Built-in tool implementations for Ragway.
//!
//! The agent currently has one capability: looking up up-to-date
//! knowledge in the vector store. Further tools register on the same
//! `ToolRegistry` without changes to the loop.

pub mod search_knowledge;

use ragway_core::retrieval::Retriever;
use ragway_core::tool::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;

pub use search_knowledge::SearchKnowledgeTool;

/// Create the default tool registry for the retrieval agent.
pub fn default_registry(retriever: Arc<dyn Retriever>, top_k: usize, wait: Duration) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(
        SearchKnowledgeTool::new(retriever)
            .with_top_k(top_k)
            .with_timeout(wait),
    ));
    registry
}
