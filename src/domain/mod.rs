//! Domain types and contracts shared across the gateway.

pub mod chat;
pub mod embedding;
pub mod error;
pub mod vector;

pub use chat::{ChatRequest, ChatResponse, ChatStream, LlmClient, Message, MessageRole, StreamEvent};
pub use embedding::{Embedder, EmbedderKind};
pub use error::DomainError;
pub use vector::{EmbeddingVector, SearchResult, VectorPoint, VectorStore, VectorStoreKind};
