//! OpenAI-compatible embedding providers.

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::embedding::Embedder;
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClient;

/// Embedder for the plain OpenAI embeddings API.
#[derive(Debug)]
pub struct OpenAiEmbedder<C: HttpClient> {
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClient> OpenAiEmbedder<C> {
    pub fn new(client: C, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            auth_header: format!("Bearer {}", api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }
}

#[async_trait]
impl<C: HttpClient> Embedder for OpenAiEmbedder<C> {
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        let body = serde_json::json!({ "model": model, "input": text });

        let response = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await?;

        parse_embedding(response)
    }
}

/// Embedder for Azure OpenAI deployments. The model name selects the
/// deployment path and authentication uses the `api-key` header.
#[derive(Debug)]
pub struct AzureOpenAiEmbedder<C: HttpClient> {
    client: C,
    api_key: String,
    base_url: String,
    api_version: String,
}

impl<C: HttpClient> AzureOpenAiEmbedder<C> {
    const DEFAULT_API_VERSION: &'static str = "2023-05-15";

    pub fn new(client: C, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: Self::DEFAULT_API_VERSION.to_string(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    fn embeddings_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.base_url, deployment, self.api_version
        )
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("api-key", self.api_key.as_str()),
            ("Content-Type", "application/json"),
        ]
    }
}

#[async_trait]
impl<C: HttpClient> Embedder for AzureOpenAiEmbedder<C> {
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
        let body = serde_json::json!({ "input": text });

        let response = self
            .client
            .post_json(&self.embeddings_url(model), self.headers(), &body)
            .await?;

        parse_embedding(response)
    }
}

fn parse_embedding(json: serde_json::Value) -> Result<Vec<f32>, DomainError> {
    let response: EmbeddingResponse = serde_json::from_value(json)
        .map_err(|e| DomainError::data(format!("failed to parse embedding response: {e}")))?;

    response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| DomainError::data("no embedding in response"))
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
