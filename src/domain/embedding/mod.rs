//! Embedding provider contract.

use std::fmt::Debug;
use std::str::FromStr;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Embedding provider discriminator. Unknown kinds are rejected at
/// construction time, not at first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedderKind {
    OpenAi,
    AzureOpenAi,
}

impl FromStr for EmbedderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "azure-openai" => Ok(Self::AzureOpenAi),
            other => Err(DomainError::configuration(format!(
                "unknown embedder kind: {other}"
            ))),
        }
    }
}

/// Converts a text payload into a fixed-length vector via a provider call.
///
/// Dimensionality is fixed per (embedder, model) pair. Oversized payloads are
/// rejected by the provider and surface as errors; the text is never
/// truncated locally.
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic in-memory embedder for tests.
    #[derive(Debug)]
    pub struct MockEmbedder {
        dimensions: usize,
        error: Option<String>,
        calls: AtomicUsize,
    }

    impl MockEmbedder {
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                error: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, _model: &str, text: &str) -> Result<Vec<f32>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(ref error) = self.error {
                return Err(DomainError::transport("embed", error));
            }

            // Deterministic vector derived from the text bytes, so equal
            // inputs embed identically across calls.
            let hash = text.bytes().fold(0u64, |acc, b| acc.wrapping_add(b as u64));
            let vector = (0..self.dimensions)
                .map(|i| ((hash.wrapping_add(i as u64) % 1000) as f32 / 1000.0) - 0.5)
                .collect();

            Ok(vector)
        }
    }
}
