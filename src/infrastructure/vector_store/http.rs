//! Generic HTTP (REST) vector store backend.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::VectorStoreSettings;
use crate::domain::vector::{check_columnar, EmbeddingVector, SearchResult, VectorStore};
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClient;

/// Authentication applied per request. Never baked into a shared default
/// client: the same process may hold clients for multiple backends.
#[derive(Debug, Clone)]
enum StoreAuth {
    None,
    Header(&'static str, String),
}

/// Vector store backed by a REST vector API. The underlying HTTP client is
/// reused across calls.
#[derive(Debug)]
pub struct HttpVectorStore<C: HttpClient> {
    client: C,
    base_url: String,
    auth: StoreAuth,
}

impl<C: HttpClient> HttpVectorStore<C> {
    pub fn new(client: C, settings: &VectorStoreSettings) -> Self {
        let auth = if let Some(ref basic) = settings.basic_auth {
            let credentials = BASE64.encode(format!("{}:{}", basic.username, basic.password));
            StoreAuth::Header("Authorization", format!("Basic {credentials}"))
        } else if let Some(ref api_key) = settings.api_key {
            StoreAuth::Header("Authorization", format!("Bearer {api_key}"))
        } else {
            StoreAuth::None
        };

        Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        let mut headers = vec![("Content-Type", "application/json")];
        if let StoreAuth::Header(name, ref value) = self.auth {
            headers.push((name, value.as_str()));
        }
        headers
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/v1/collections/{collection}", self.base_url)
    }
}

#[async_trait]
impl<C: HttpClient> VectorStore for HttpVectorStore<C> {
    async fn collection_exists(&self, collection: &str) -> Result<bool, DomainError> {
        let url = self.collection_url(collection);
        match self.client.get_status(&url, self.headers()).await? {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(DomainError::transport(
                "store collection_exists",
                format!("HTTP {status}"),
            )),
        }
    }

    async fn create_collection(
        &self,
        collection: &str,
        dimension: usize,
    ) -> Result<(), DomainError> {
        let url = format!("{}/v1/collections", self.base_url);
        let body = serde_json::json!({ "name": collection, "dimension": dimension });
        self.client.post_json(&url, self.headers(), &body).await?;
        Ok(())
    }

    async fn point_exists(&self, collection: &str, id: u64) -> Result<bool, DomainError> {
        let url = format!("{}/points/{id}", self.collection_url(collection));
        match self.client.get_status(&url, self.headers()).await? {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(DomainError::transport(
                "store point_exists",
                format!("HTTP {status}"),
            )),
        }
    }

    async fn upsert(
        &self,
        collection: &str,
        ids: &[u64],
        embeddings: &[EmbeddingVector],
        payloads: &[Map<String, Value>],
    ) -> Result<(), DomainError> {
        check_columnar(ids, embeddings, payloads)?;

        let url = format!("{}/points", self.collection_url(collection));
        let body = serde_json::json!({
            "ids": ids,
            "embeddings": embeddings,
            "payloads": payloads,
        });
        self.client.post_json(&url, self.headers(), &body).await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&Value>,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let url = format!("{}/search", self.collection_url(collection));
        let mut body = serde_json::json!({ "vector": vector, "top_k": top_k });
        if let Some(filter) = filter {
            body["filter"] = filter.clone();
        }

        let response = self.client.post_json(&url, self.headers(), &body).await?;
        let response: SearchResponse = serde_json::from_value(response)
            .map_err(|e| DomainError::data(format!("failed to parse search response: {e}")))?;

        Ok(response.results)
    }

    async fn health(&self) -> Result<(), DomainError> {
        let url = format!("{}/v1/health", self.base_url);
        match self.client.get_status(&url, self.headers()).await? {
            status if (200..300).contains(&status) => Ok(()),
            status => Err(DomainError::transport(
                "store health",
                format!("HTTP {status}"),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}
