//! LLM gateway library: provider proxy with streaming relay, plus vector
//! synchronization and semantic search over a pluggable vector store.
//!
//! The crate is wired from [`config::Settings`]: build an LLM client with
//! [`create_llm_client`], an embedder plus store with the infrastructure
//! factories, then compose the services in [`services`].

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;
pub mod services;

use std::sync::Arc;

use domain::chat::LlmClient;
use domain::embedding::Embedder;
use domain::vector::VectorStore;
use domain::DomainError;
use infrastructure::http_client::ReqwestClient;
use infrastructure::vector_store::StoreTeardown;

/// Build the chat client for the configured provider proxy.
pub fn create_llm_client(settings: &config::LlmSettings) -> Arc<dyn LlmClient> {
    Arc::new(infrastructure::llm::OpenAiChatClient::new(
        ReqwestClient::new(),
        settings.url.clone(),
        settings.api_key.clone(),
    ))
}

/// Build the embedder selected by the settings discriminator.
pub fn create_embedder(settings: &config::EmbedderSettings) -> Result<Arc<dyn Embedder>, DomainError> {
    infrastructure::embedding::create_embedder(ReqwestClient::new(), settings)
}

/// Build the vector store backend plus its shutdown handle.
pub fn create_vector_store(
    settings: &config::VectorStoreSettings,
) -> Result<(Arc<dyn VectorStore>, StoreTeardown), DomainError> {
    infrastructure::vector_store::create_vector_store(settings)
}
