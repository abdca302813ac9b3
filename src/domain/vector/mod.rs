//! Vector store domain types and the store contract.

mod point;
mod store;

pub use point::{canonical_json, content_id, fnv1a64, EmbeddingVector, SearchResult, VectorPoint};
pub use store::{check_columnar, VectorStore, VectorStoreKind};

#[cfg(test)]
pub use store::mock;
