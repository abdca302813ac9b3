use async_trait::async_trait;
use futures::Stream;
use std::fmt::Debug;
use std::pin::Pin;

use super::{ChatRequest, ChatResponse, StreamEvent};
use crate::domain::DomainError;

/// Stream handle for a streamed chat completion. A provider-side error
/// surfaces as an `Err` item on the next read rather than aborting silently.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, DomainError>> + Send>>;

/// Client for a single configured LLM backend.
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    /// Lightweight health probe against the proxy boundary. Returns false
    /// (not an error) when the backend is reachable but not configured;
    /// errors only on transport failure.
    async fn enabled(&self) -> Result<bool, DomainError>;

    /// Synchronous chat completion. Requests are validated before any
    /// network call is made.
    async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse, DomainError>;

    /// Streamed chat completion, same validation rules.
    async fn chat_completion_stream(&self, request: ChatRequest)
        -> Result<ChatStream, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::chat::Message;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted in-memory LLM client for tests.
    #[derive(Debug)]
    pub struct MockLlmClient {
        response: Option<ChatResponse>,
        stream_events: Vec<Result<StreamEvent, DomainError>>,
        error: Option<String>,
        calls: AtomicUsize,
    }

    impl MockLlmClient {
        pub fn new() -> Self {
            Self {
                response: None,
                stream_events: Vec::new(),
                error: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_response(mut self, content: impl Into<String>) -> Self {
            self.response = Some(ChatResponse::new(
                "mock-id".to_string(),
                "mock-model".to_string(),
                Message::assistant(content),
            ));
            self
        }

        pub fn with_stream_events(mut self, events: Vec<StreamEvent>) -> Self {
            self.stream_events = events.into_iter().map(Ok).collect();
            self
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        /// Number of calls that got past validation.
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn enabled(&self) -> Result<bool, DomainError> {
            Ok(self.error.is_none())
        }

        async fn chat_completion(
            &self,
            request: ChatRequest,
        ) -> Result<ChatResponse, DomainError> {
            request.validate()?;
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(ref error) = self.error {
                return Err(DomainError::transport("chat_completion", error));
            }

            self.response
                .clone()
                .ok_or_else(|| DomainError::data("no mock response configured"))
        }

        async fn chat_completion_stream(
            &self,
            request: ChatRequest,
        ) -> Result<ChatStream, DomainError> {
            request.validate()?;
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(ref error) = self.error {
                return Err(DomainError::transport("chat_completion_stream", error));
            }

            let events: Vec<Result<StreamEvent, DomainError>> = self
                .stream_events
                .iter()
                .map(|r| match r {
                    Ok(e) => Ok(e.clone()),
                    Err(_) => Err(DomainError::data("mock stream error")),
                })
                .collect();

            Ok(Box::pin(stream::iter(events)))
        }
    }
}
