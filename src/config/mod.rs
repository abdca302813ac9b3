//! Settings supplied by the host's secret store at construction time.
//!
//! Settings are loaded once; changes require a process restart and are never
//! polled mid-cycle.

use std::collections::HashMap;

use serde::Deserialize;

/// Top-level gateway settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// LLM provider proxy; absent means the chat subsystem is unconfigured.
    pub llm: Option<LlmSettings>,
    /// Embedding provider; absent means the vector subsystem is unconfigured.
    pub embedder: Option<EmbedderSettings>,
    /// Vector database backend.
    pub vector_store: Option<VectorStoreSettings>,
    /// Per-collection embedding model bindings, read-only after construction.
    #[serde(default)]
    pub collections: Vec<CollectionBinding>,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedderSettings {
    /// Discriminator: `openai` or `azure-openai`.
    pub kind: String,
    pub url: String,
    pub api_key: Option<String>,
    pub azure_api_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreSettings {
    /// Discriminator: `qdrant` (gRPC) or `http`.
    pub kind: String,
    pub url: String,
    pub api_key: Option<String>,
    pub basic_auth: Option<BasicAuthSettings>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BasicAuthSettings {
    pub username: String,
    pub password: String,
}

/// Binds a vector collection to the embedding model used to populate it.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionBinding {
    pub name: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    /// Collection kept in sync by the background engine.
    pub collection: String,
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            collection: "dashboards".to_string(),
            interval_secs: default_sync_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_sync_interval_secs() -> u64 {
    // 15 minutes
    900
}

fn default_batch_size() -> usize {
    100
}

impl Settings {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Populate the process environment from a local .env, if present.
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Collection name → embedding model, as a lookup map.
    pub fn collection_bindings(&self) -> HashMap<String, String> {
        self.collections
            .iter()
            .map(|b| (b.name.clone(), b.model.clone()))
            .collect()
    }

    /// Model bound to the sync target collection, if configured.
    pub fn sync_model(&self) -> Option<&str> {
        self.collections
            .iter()
            .find(|b| b.name == self.sync.collection)
            .map(|b| b.model.as_str())
    }
}
