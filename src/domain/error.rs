use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Transport error in {operation}: {message}")]
    Transport { operation: String, message: String },

    #[error("Data error: {message}")]
    Data { message: String },

    #[error("Unknown collection: {collection}")]
    UnknownCollection { collection: String },

    #[error("Collection not found: {collection}")]
    CollectionNotFound { collection: String },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    pub fn unknown_collection(collection: impl Into<String>) -> Self {
        Self::UnknownCollection {
            collection: collection.into(),
        }
    }

    pub fn collection_not_found(collection: impl Into<String>) -> Self {
        Self::CollectionNotFound {
            collection: collection.into(),
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// True for errors raised before any network call was made.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
