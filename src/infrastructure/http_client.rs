use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::domain::DomainError;

/// Stream type for HTTP response bodies
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DomainError>> + Send>>;

/// Trait for HTTP client operations (for mocking).
///
/// Headers are supplied per request; authentication is never baked into a
/// shared default client since one process may hold clients for several
/// backends at once.
#[async_trait]
pub trait HttpClient: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError>;

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError>;

    /// Issue a GET and report the status code. Any HTTP response, success or
    /// not, is `Ok`; only a transport-level failure is an error. Used by
    /// health probes that must distinguish "unreachable" from "reachable but
    /// not configured".
    async fn get_status(&self, url: &str, headers: Vec<(&str, &str)>)
        -> Result<u16, DomainError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, DomainError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::transport(format!("POST {url}"), e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::transport(
                format!("POST {url}"),
                format!("HTTP {status}: {error_body}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| DomainError::data(format!("failed to parse response from {url}: {e}")))
    }

    async fn post_json_stream(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<ByteStream, DomainError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::transport(format!("POST {url}"), e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::transport(
                format!("POST {url}"),
                format!("HTTP {status}: {error_body}"),
            ));
        }

        use futures::StreamExt;
        let operation = format!("POST {url}");
        let stream = response.bytes_stream().map(move |result| {
            result.map_err(|e| DomainError::transport(operation.clone(), e.to_string()))
        });

        Ok(Box::pin(stream))
    }

    async fn get_status(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
    ) -> Result<u16, DomainError> {
        let mut request = self.client.get(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::transport(format!("GET {url}"), e.to_string()))?;

        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use futures::stream;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::RwLock;

    #[derive(Debug, Default)]
    pub struct MockHttpClient {
        responses: RwLock<HashMap<String, serde_json::Value>>,
        stream_responses: RwLock<HashMap<String, Vec<Bytes>>>,
        statuses: RwLock<HashMap<String, u16>>,
        errors: RwLock<HashMap<String, String>>,
        bodies: RwLock<Vec<serde_json::Value>>,
        calls: AtomicUsize,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(self, url: impl Into<String>, response: serde_json::Value) -> Self {
            self.responses.write().unwrap().insert(url.into(), response);
            self
        }

        pub fn with_stream_response(self, url: impl Into<String>, chunks: Vec<Bytes>) -> Self {
            self.stream_responses
                .write()
                .unwrap()
                .insert(url.into(), chunks);
            self
        }

        pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
            self.statuses.write().unwrap().insert(url.into(), status);
            self
        }

        pub fn with_error(self, url: impl Into<String>, error: impl Into<String>) -> Self {
            self.errors.write().unwrap().insert(url.into(), error.into());
            self
        }

        /// Total network calls issued through this client.
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Body of the most recent POST, for asserting what went on the wire.
        pub fn last_body(&self) -> Option<serde_json::Value> {
            self.bodies.read().unwrap().last().cloned()
        }

        fn check_error(&self, url: &str, operation: &str) -> Result<(), DomainError> {
            if let Some(error) = self.errors.read().unwrap().get(url) {
                return Err(DomainError::transport(operation, error));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn post_json(
            &self,
            url: &str,
            _headers: Vec<(&str, &str)>,
            body: &serde_json::Value,
        ) -> Result<serde_json::Value, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies.write().unwrap().push(body.clone());
            self.check_error(url, "POST")?;

            self.responses
                .read()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| DomainError::transport("POST", format!("no mock response for {url}")))
        }

        async fn post_json_stream(
            &self,
            url: &str,
            _headers: Vec<(&str, &str)>,
            body: &serde_json::Value,
        ) -> Result<ByteStream, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies.write().unwrap().push(body.clone());
            self.check_error(url, "POST")?;

            let chunks = self
                .stream_responses
                .read()
                .unwrap()
                .get(url)
                .cloned()
                .unwrap_or_default();

            let stream = stream::iter(chunks.into_iter().map(Ok));
            Ok(Box::pin(stream))
        }

        async fn get_status(
            &self,
            url: &str,
            _headers: Vec<(&str, &str)>,
        ) -> Result<u16, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.check_error(url, "GET")?;

            Ok(self
                .statuses
                .read()
                .unwrap()
                .get(url)
                .copied()
                .unwrap_or(200))
        }
    }
}
