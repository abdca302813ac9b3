//! Semantic search orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::embedding::Embedder;
use crate::domain::vector::{SearchResult, VectorStore};
use crate::domain::DomainError;

/// Composes the embedder and the vector store to answer search requests.
#[derive(Debug)]
pub struct VectorService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    /// Collection → embedding model, loaded once at construction.
    collections: HashMap<String, String>,
}

impl VectorService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        collections: HashMap<String, String>,
    ) -> Self {
        Self {
            embedder,
            store,
            collections,
        }
    }

    /// Embed the query with the collection's bound model and run a
    /// similarity search. Results are returned exactly as the store ordered
    /// them; query embeddings are not cached.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        self.search_filtered(collection, query, top_k, None).await
    }

    pub async fn search_filtered(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
        filter: Option<&serde_json::Value>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        // Local configuration and store state can drift, so both checks are
        // required and report distinct errors.
        let model = self
            .collections
            .get(collection)
            .ok_or_else(|| DomainError::unknown_collection(collection))?;

        if !self.store.collection_exists(collection).await? {
            return Err(DomainError::collection_not_found(collection));
        }

        debug!(collection, model, top_k, "running semantic search");

        let vector = self.embedder.embed(model, query).await?;
        self.store.search(collection, &vector, top_k, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::mock::MockEmbedder;
    use crate::domain::vector::mock::MockVectorStore;
    use serde_json::Map;

    fn bindings() -> HashMap<String, String> {
        HashMap::from([("dashboards".to_string(), "embed-model".to_string())])
    }

    #[tokio::test]
    async fn test_search_returns_store_results_unmodified() {
        let results = vec![
            SearchResult {
                payload: Map::new(),
                score: 0.92,
            },
            SearchResult {
                payload: Map::new(),
                score: 0.55,
            },
        ];
        let store = Arc::new(
            MockVectorStore::new()
                .with_collection("dashboards", 8)
                .with_search_results(results),
        );
        let embedder = Arc::new(MockEmbedder::new(8));
        let service = VectorService::new(embedder, store, bindings());

        let found = service.search("dashboards", "cpu usage", 5).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].score, 0.92);
        assert_eq!(found[1].score, 0.55);
    }

    #[tokio::test]
    async fn test_unconfigured_collection_is_unknown() {
        let store = Arc::new(MockVectorStore::new().with_collection("dashboards", 8));
        let embedder = Arc::new(MockEmbedder::new(8));
        let service = VectorService::new(embedder.clone(), store, bindings());

        let err = service.search("alerts", "q", 5).await.unwrap_err();
        assert!(matches!(err, DomainError::UnknownCollection { .. }));
        // Failure happens before any embedding call.
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_configured_but_absent_collection_is_not_found() {
        // Configured locally, but never created in the live store.
        let store = Arc::new(MockVectorStore::new());
        let embedder = Arc::new(MockEmbedder::new(8));
        let service = VectorService::new(embedder.clone(), store, bindings());

        let err = service.search("dashboards", "q", 5).await.unwrap_err();
        assert!(matches!(err, DomainError::CollectionNotFound { .. }));
        assert_eq!(embedder.call_count(), 0);
    }
}
