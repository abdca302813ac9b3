//! Composite health reporting over the configured subsystems.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::domain::chat::LlmClient;
use crate::domain::vector::VectorStore;

/// Health of one subsystem.
///
/// `configured` reflects local settings only; `reachable` and `enabled` come
/// from a live probe. An unconfigured subsystem is reported, not an error.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SubsystemHealth {
    pub configured: bool,
    pub reachable: bool,
    pub enabled: bool,
}

impl SubsystemHealth {
    fn unconfigured() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub llm: SubsystemHealth,
    pub vector: SubsystemHealth,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        let subsystem_ok =
            |s: &SubsystemHealth| !s.configured || (s.reachable && s.enabled);
        subsystem_ok(&self.llm) && subsystem_ok(&self.vector)
    }
}

/// Probes whatever subsystems are configured and folds failures into flags.
/// Reporting never errors; a dead backend is a finding, not a failure.
pub struct HealthService {
    llm: Option<Arc<dyn LlmClient>>,
    vector: Option<Arc<dyn VectorStore>>,
}

impl HealthService {
    pub fn new(llm: Option<Arc<dyn LlmClient>>, vector: Option<Arc<dyn VectorStore>>) -> Self {
        Self { llm, vector }
    }

    pub async fn report(&self) -> HealthReport {
        HealthReport {
            llm: self.probe_llm().await,
            vector: self.probe_vector().await,
        }
    }

    async fn probe_llm(&self) -> SubsystemHealth {
        let Some(client) = &self.llm else {
            return SubsystemHealth::unconfigured();
        };

        match client.enabled().await {
            Ok(enabled) => SubsystemHealth {
                configured: true,
                reachable: true,
                enabled,
            },
            Err(e) => {
                warn!(error = %e, "llm health probe failed");
                SubsystemHealth {
                    configured: true,
                    reachable: false,
                    enabled: false,
                }
            }
        }
    }

    async fn probe_vector(&self) -> SubsystemHealth {
        let Some(store) = &self.vector else {
            return SubsystemHealth::unconfigured();
        };

        match store.health().await {
            Ok(()) => SubsystemHealth {
                configured: true,
                reachable: true,
                enabled: true,
            },
            Err(e) => {
                warn!(error = %e, "vector store health probe failed");
                SubsystemHealth {
                    configured: true,
                    reachable: false,
                    enabled: false,
                }
            }
        }
    }
}
