//! Supabase pgvector retriever.
//!
//! Embeds the query through the configured provider, then calls the
//! `match_documents` Postgres function over PostgREST:
//!
//! ```text
//! POST {url}/rest/v1/rpc/{query_name}
//! { "query_embedding": [...], "match_count": k, "filter": {} }
//! ```

use async_trait::async_trait;
use ragway_core::error::RetrievalError;
use ragway_core::provider::{EmbeddingRequest, Provider};
use ragway_core::retrieval::{Passage, Retriever};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct SupabaseRetriever {
    url: String,
    key: String,
    query_name: String,
    embedding_model: String,
    embedder: Arc<dyn Provider>,
    client: reqwest::Client,
}

impl SupabaseRetriever {
    pub fn new(
        url: impl Into<String>,
        key: impl Into<String>,
        query_name: impl Into<String>,
        embedder: Arc<dyn Provider>,
        embedding_model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            url: url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            query_name: query_name.into(),
            embedding_model: embedding_model.into(),
            embedder,
            client,
        }
    }

    fn rpc_url(&self) -> String {
        format!("{}/rest/v1/rpc/{}", self.url, self.query_name)
    }

    fn rpc_body(embedding: &[f32], top_k: usize) -> serde_json::Value {
        serde_json::json!({
            "query_embedding": embedding,
            "match_count": top_k,
            "filter": {},
        })
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        let response = self
            .embedder
            .embed(EmbeddingRequest {
                model: self.embedding_model.clone(),
                inputs: vec![query.to_string()],
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

/// One row returned by `match_documents`.
#[derive(Debug, Deserialize)]
struct MatchRow {
    content: String,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    similarity: f32,
}

impl From<MatchRow> for Passage {
    fn from(row: MatchRow) -> Self {
        Passage {
            content: row.content,
            score: row.similarity,
            metadata: row.metadata.unwrap_or_default(),
        }
    }
}

fn parse_rows(body: &str, top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
    let rows: Vec<MatchRow> =
        serde_json::from_str(body).map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;
    let mut passages: Vec<Passage> = rows.into_iter().map(Passage::from).collect();
    passages.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    passages.truncate(top_k);
    Ok(passages)
}

#[async_trait]
impl Retriever for SupabaseRetriever {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let embedding = self.embed_query(query).await?;

        debug!(query_name = %self.query_name, top_k, "Querying Supabase vector store");

        let response = self
            .client
            .post(self.rpc_url())
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
            .json(&Self::rpc_body(&embedding, top_k))
            .send()
            .await
            .map_err(|e| RetrievalError::Unreachable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RetrievalError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %body, "Supabase returned error");
            return Err(RetrievalError::Unreachable(format!(
                "status {}: {body}",
                status.as_u16()
            )));
        }

        parse_rows(&body, top_k)
    }
}
