//! Concrete backends: HTTP transport, LLM client, embedders, vector stores.

pub mod embedding;
pub mod http_client;
pub mod llm;
pub mod vector_store;

pub use http_client::{HttpClient, ReqwestClient};
