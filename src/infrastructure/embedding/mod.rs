//! Embedding providers and their factory.

mod openai;

use std::sync::Arc;

pub use openai::{AzureOpenAiEmbedder, OpenAiEmbedder};

use crate::config::EmbedderSettings;
use crate::domain::embedding::{Embedder, EmbedderKind};
use crate::domain::DomainError;
use crate::infrastructure::http_client::HttpClient;

/// Build the embedder selected by the settings discriminator. Unknown kinds
/// fail here, at construction, not at first use.
pub fn create_embedder<C: HttpClient + 'static>(
    client: C,
    settings: &EmbedderSettings,
) -> Result<Arc<dyn Embedder>, DomainError> {
    let kind: EmbedderKind = settings.kind.parse()?;

    match kind {
        EmbedderKind::OpenAi => Ok(Arc::new(OpenAiEmbedder::new(
            client,
            settings.url.clone(),
            settings.api_key.clone().unwrap_or_default(),
        ))),
        EmbedderKind::AzureOpenAi => {
            let mut embedder = AzureOpenAiEmbedder::new(
                client,
                settings.url.clone(),
                settings.api_key.clone().unwrap_or_default(),
            );
            if let Some(ref api_version) = settings.azure_api_version {
                embedder = embedder.with_api_version(api_version.clone());
            }
            Ok(Arc::new(embedder))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::http_client::mock::MockHttpClient;

    #[test]
    fn test_factory_rejects_unknown_kind() {
        let settings = EmbedderSettings {
            kind: "word2vec".to_string(),
            url: "http://localhost".to_string(),
            api_key: None,
            azure_api_version: None,
        };

        let err = create_embedder(MockHttpClient::new(), &settings).unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_factory_builds_openai_embedder() {
        let settings = EmbedderSettings {
            kind: "openai".to_string(),
            url: "http://localhost".to_string(),
            api_key: Some("key".to_string()),
            azure_api_version: None,
        };

        assert!(create_embedder(MockHttpClient::new(), &settings).is_ok());
    }
}
