//! In-memory retriever, useful for testing and local demos.

use async_trait::async_trait;
use ragway_core::error::RetrievalError;
use ragway_core::provider::{EmbeddingRequest, Provider};
use ragway_core::retrieval::{Passage, Retriever};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vector::{cosine_similarity, keyword_score};

struct Document {
    content: String,
    metadata: serde_json::Map<String, serde_json::Value>,
    embedding: Option<Vec<f32>>,
}

struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
}

/// A retriever over a `Vec` of documents.
///
/// With an embedder configured, documents and queries are embedded and
/// ranked by cosine similarity. Without one, ranking falls back to
/// keyword overlap.
pub struct InMemoryRetriever {
    documents: RwLock<Vec<Document>>,
    embedder: Option<Embedder>,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            embedder: None,
        }
    }

    pub fn with_embedder(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            embedder: Some(Embedder {
                provider,
                model: model.into(),
            }),
        }
    }

    /// Add a document to the index, embedding it when an embedder is set.
    pub async fn add(&self, content: impl Into<String>) -> Result<(), RetrievalError> {
        self.add_with_metadata(content, serde_json::Map::new()).await
    }

    pub async fn add_with_metadata(
        &self,
        content: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), RetrievalError> {
        let content = content.into();
        let embedding = match &self.embedder {
            Some(e) => Some(e.embed(&content).await?),
            None => None,
        };
        self.documents.write().await.push(Document {
            content,
            metadata,
            embedding,
        });
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl Default for InMemoryRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("provider returned no embedding".into()))
    }
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let query_embedding = match &self.embedder {
            Some(e) => Some(e.embed(query).await?),
            None => None,
        };

        let documents = self.documents.read().await;
        let mut results: Vec<Passage> = documents
            .iter()
            .filter_map(|doc| {
                let score = match (&query_embedding, &doc.embedding) {
                    (Some(q), Some(d)) => cosine_similarity(q, d),
                    _ => keyword_score(query, &doc.content),
                };
                (score > 0.0).then(|| Passage {
                    content: doc.content.clone(),
                    score,
                    metadata: doc.metadata.clone(),
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragway_core::error::ProviderError;
    use ragway_core::provider::{EmbeddingResponse, ProviderRequest, ProviderResponse};

    /// Embeds text as (contains "rust", contains "python", 1.0).
    struct TopicEmbedder;

    #[async_trait]
    impl Provider for TopicEmbedder {
        fn name(&self) -> &str {
            "topic"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("embeddings only".into()))
        }

        async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
            let embeddings = request
                .inputs
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        if t.contains("rust") { 1.0 } else { 0.0 },
                        if t.contains("python") { 1.0 } else { 0.0 },
                        0.1,
                    ]
                })
                .collect();
            Ok(EmbeddingResponse {
                embeddings,
                model: request.model,
            })
        }
    }

    #[tokio::test]
    async fn keyword_search_ranks_and_truncates() {
        let retriever = InMemoryRetriever::new();
        retriever
            .add("LangChain is a framework for building LLM applications")
            .await
            .unwrap();
        retriever.add("LangChain supports agents").await.unwrap();
        retriever.add("JavaScript runs in the browser").await.unwrap();

        let results = retriever.search("LangChain agents", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "LangChain supports agents");
    }

    #[tokio::test]
    async fn keyword_search_drops_non_matches() {
        let retriever = InMemoryRetriever::new();
        retriever.add("JavaScript runs in the browser").await.unwrap();
        assert!(retriever.search("LangChain", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embedding_search_uses_cosine_similarity() {
        let retriever = InMemoryRetriever::with_embedder(Arc::new(TopicEmbedder), "topic-v1");
        retriever.add("Rust has a borrow checker").await.unwrap();
        retriever.add("Python has a GIL").await.unwrap();
        assert_eq!(retriever.len().await, 2);

        let results = retriever.search("tell me about rust", 2).await.unwrap();
        assert_eq!(results[0].content, "Rust has a borrow checker");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn metadata_is_carried_through() {
        let retriever = InMemoryRetriever::new();
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), "intro.md".into());
        retriever
            .add_with_metadata("LangChain intro", metadata)
            .await
            .unwrap();

        let results = retriever.search("langchain", 1).await.unwrap();
        assert_eq!(results[0].metadata["source"], "intro.md");
    }
}
