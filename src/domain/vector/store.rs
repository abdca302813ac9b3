use std::fmt::Debug;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{EmbeddingVector, SearchResult};
use crate::domain::DomainError;

/// Vector store discriminator. Unknown kinds are rejected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorStoreKind {
    Qdrant,
    Http,
}

impl FromStr for VectorStoreKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qdrant" => Ok(Self::Qdrant),
            "http" => Ok(Self::Http),
            other => Err(DomainError::configuration(format!(
                "unknown vector store kind: {other}"
            ))),
        }
    }
}

/// Pluggable vector database client.
///
/// Implementations must be safe for concurrent use; connection management is
/// delegated to the underlying transport.
#[async_trait]
pub trait VectorStore: Send + Sync + Debug {
    async fn collection_exists(&self, collection: &str) -> Result<bool, DomainError>;

    async fn create_collection(&self, collection: &str, dimension: usize)
        -> Result<(), DomainError>;

    async fn point_exists(&self, collection: &str, id: u64) -> Result<bool, DomainError>;

    /// Columnar upsert: the three slices are parallel and must have equal
    /// length. The batch is all-or-nothing; a failure partway is reported as
    /// an error for the whole batch and partial success is never assumed.
    async fn upsert(
        &self,
        collection: &str,
        ids: &[u64],
        embeddings: &[EmbeddingVector],
        payloads: &[Map<String, Value>],
    ) -> Result<(), DomainError>;

    /// Similarity search, results ordered by score descending as returned by
    /// the store.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Value>,
    ) -> Result<Vec<SearchResult>, DomainError>;

    async fn health(&self) -> Result<(), DomainError>;
}

/// Shared guard for columnar upsert arguments.
pub fn check_columnar(
    ids: &[u64],
    embeddings: &[EmbeddingVector],
    payloads: &[Map<String, Value>],
) -> Result<(), DomainError> {
    if ids.len() != embeddings.len() || ids.len() != payloads.len() {
        return Err(DomainError::validation(format!(
            "columnar upsert arrays must have equal length: {} ids, {} embeddings, {} payloads",
            ids.len(),
            embeddings.len(),
            payloads.len()
        )));
    }
    Ok(())
}
