//! Knowledge search tool: RAG retrieval over the vector store.
//!
//! Returns the top-k passages for the model's query, joined by blank
//! lines, so the model can ground its answer in them.

use async_trait::async_trait;
use ragway_core::error::ToolError;
use ragway_core::retrieval::Retriever;
use ragway_core::tool::Tool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const TOOL_NAME: &str = "search_latest_knowledge";

pub struct SearchKnowledgeTool {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    timeout: Duration,
}

impl SearchKnowledgeTool {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            retriever,
            top_k: 1,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// Bound how long a single store query may take.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for SearchKnowledgeTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Searches and returns up-to-date general information."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: TOOL_NAME.into(),
                reason: "missing string argument 'query'".into(),
            })?;

        debug!(retriever = self.retriever.name(), query, top_k = self.top_k, "Searching knowledge");

        let passages = tokio::time::timeout(self.timeout, self.retriever.search(query, self.top_k))
            .await
            .map_err(|_| ToolError::Timeout {
                tool_name: TOOL_NAME.into(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| {
                warn!(error = %e, "Knowledge search failed");
                ToolError::Unavailable {
                    tool_name: TOOL_NAME.into(),
                    reason: e.to_string(),
                }
            })?;

        Ok(passages
            .into_iter()
            .map(|p| p.content)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragway_core::error::RetrievalError;
    use ragway_core::retrieval::Passage;
    use ragway_retrieval::InMemoryRetriever;

    struct DownRetriever;

    #[async_trait]
    impl Retriever for DownRetriever {
        fn name(&self) -> &str {
            "down"
        }
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
            Err(RetrievalError::Unreachable("connection refused".into()))
        }
    }

    struct HangingRetriever;

    #[async_trait]
    impl Retriever for HangingRetriever {
        fn name(&self) -> &str {
            "hanging"
        }
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    async fn seeded() -> Arc<InMemoryRetriever> {
        let retriever = InMemoryRetriever::new();
        retriever
            .add("LangChain is a framework for developing LLM applications.")
            .await
            .unwrap();
        retriever
            .add("LangChain Expression Language composes chains.")
            .await
            .unwrap();
        retriever.add("Tokio is an async runtime.").await.unwrap();
        Arc::new(retriever)
    }

    #[tokio::test]
    async fn returns_top_passage_by_default() {
        let tool = SearchKnowledgeTool::new(seeded().await);
        let output = tool
            .execute(serde_json::json!({"query": "LangChain framework"}))
            .await
            .unwrap();
        assert_eq!(output, "LangChain is a framework for developing LLM applications.");
    }

    #[tokio::test]
    async fn joins_passages_with_blank_line() {
        let tool = SearchKnowledgeTool::new(seeded().await).with_top_k(2);
        let output = tool
            .execute(serde_json::json!({"query": "LangChain"}))
            .await
            .unwrap();
        assert_eq!(output.split("\n\n").count(), 2);
    }

    #[tokio::test]
    async fn no_matches_yields_empty_observation() {
        let tool = SearchKnowledgeTool::new(seeded().await);
        let output = tool
            .execute(serde_json::json!({"query": "kubernetes"}))
            .await
            .unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn missing_query_is_invalid() {
        let tool = SearchKnowledgeTool::new(seeded().await);
        let err = tool.execute(serde_json::json!({"q": "x"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn store_failure_is_unavailable() {
        let tool = SearchKnowledgeTool::new(Arc::new(DownRetriever));
        let err = tool
            .execute(serde_json::json!({"query": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Unavailable { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let tool =
            SearchKnowledgeTool::new(Arc::new(HangingRetriever)).with_timeout(Duration::from_secs(2));
        let err = tool
            .execute(serde_json::json!({"query": "x"}))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::Timeout {
                tool_name: TOOL_NAME.into(),
                timeout_ms: 2000
            }
        );
    }
}
