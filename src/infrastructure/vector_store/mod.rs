//! Vector store backends and their factory.

mod http;
mod qdrant;

use std::sync::Arc;

pub use http::HttpVectorStore;
pub use qdrant::QdrantStore;
use tracing::debug;

use crate::config::VectorStoreSettings;
use crate::domain::vector::{VectorStore, VectorStoreKind};
use crate::domain::DomainError;
use crate::infrastructure::http_client::ReqwestClient;

/// Explicit teardown for a store's connection. The factory hands this back
/// alongside the client; callers invoke it on shutdown.
pub struct StoreTeardown(Option<Box<dyn FnOnce() + Send>>);

impl std::fmt::Debug for StoreTeardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StoreTeardown")
            .field(&self.0.as_ref().map(|_| "FnOnce"))
            .finish()
    }
}

impl StoreTeardown {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn shutdown(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Build the store selected by the settings discriminator. Unknown kinds
/// fail here, at construction.
pub fn create_vector_store(
    settings: &VectorStoreSettings,
) -> Result<(Arc<dyn VectorStore>, StoreTeardown), DomainError> {
    let kind: VectorStoreKind = settings.kind.parse()?;

    match kind {
        VectorStoreKind::Qdrant => {
            let store = Arc::new(QdrantStore::new(settings)?);
            let handle = Arc::clone(&store);
            // The gRPC channel closes when the last reference drops; the
            // teardown releases the factory's reference and records shutdown.
            let teardown = StoreTeardown::new(move || {
                debug!("closing qdrant gRPC channel");
                drop(handle);
            });
            Ok((store, teardown))
        }
        VectorStoreKind::Http => {
            let store = Arc::new(HttpVectorStore::new(ReqwestClient::new(), settings));
            Ok((store, StoreTeardown::noop()))
        }
    }
}
