//! Retriever implementations for Ragway.
//!
//! All retrievers implement `ragway_core::Retriever`. `from_config` picks
//! the backend named in `[retrieval]`.

pub mod in_memory;
pub mod supabase;
pub mod vector;

pub use in_memory::InMemoryRetriever;
pub use supabase::SupabaseRetriever;

use ragway_config::{AppConfig, RetrievalBackend};
use ragway_core::error::RetrievalError;
use ragway_core::provider::Provider;
use ragway_core::retrieval::Retriever;
use std::sync::Arc;

/// Build the retriever described by the configuration.
///
/// The Supabase backend embeds queries through `embedder`.
pub fn from_config(
    config: &AppConfig,
    embedder: Arc<dyn Provider>,
) -> Result<Arc<dyn Retriever>, RetrievalError> {
    match config.retrieval.backend {
        RetrievalBackend::Memory => Ok(Arc::new(InMemoryRetriever::with_embedder(
            embedder,
            config.embedding_model(),
        ))),
        RetrievalBackend::Supabase => {
            let url = config.retrieval.supabase_url.clone().ok_or_else(|| {
                RetrievalError::Unreachable("SUPABASE_URL is not set".into())
            })?;
            let key = config.retrieval.supabase_key.clone().ok_or_else(|| {
                RetrievalError::Unreachable("SUPABASE_PRIVATE_KEY is not set".into())
            })?;
            tracing::info!(url = %url, table = %config.retrieval.table, "Using Supabase retriever");
            Ok(Arc::new(SupabaseRetriever::new(
                url,
                key,
                config.retrieval.query_name.clone(),
                embedder,
                config.embedding_model(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ragway_core::error::ProviderError;
    use ragway_core::provider::{ProviderRequest, ProviderResponse};

    struct Dummy;

    #[async_trait]
    impl Provider for Dummy {
        fn name(&self) -> &str {
            "dummy"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotConfigured("dummy".into()))
        }
    }

    #[test]
    fn supabase_requires_url_and_key() {
        let config = AppConfig::default();
        assert!(from_config(&config, Arc::new(Dummy)).is_err());

        let mut config = AppConfig::default();
        config.retrieval.supabase_url = Some("https://x.supabase.co".into());
        config.retrieval.supabase_key = Some("key".into());
        let retriever = from_config(&config, Arc::new(Dummy)).unwrap();
        assert_eq!(retriever.name(), "supabase");
    }

    #[test]
    fn memory_backend_selected() {
        let mut config = AppConfig::default();
        config.retrieval.backend = RetrievalBackend::Memory;
        let retriever = from_config(&config, Arc::new(Dummy)).unwrap();
        assert_eq!(retriever.name(), "in_memory");
    }
}
