//! Read-only health probe across the three backends.
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use ragkit_vector::IndexReadiness;

use crate::orchestrator::RagPipeline;

pub const VECTOR_STORE: &str = "vector_store";
pub const EMBEDDINGS: &str = "embeddings";
pub const GENERATION: &str = "generation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceStatus {
    fn new(status: HealthStatus, message: impl Into<String>) -> Self { Self { status, message: Some(message.into()) } }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// `healthy` only when every service is healthy, otherwise `degraded`.
    pub status: HealthStatus,
    pub services: BTreeMap<String, ServiceStatus>,
}

impl RagPipeline {
    /// Probe the vector store (stats) and the embedder (one short embedding).
    /// The generation backend is only described; probing it would be billed.
    pub async fn health(&self) -> HealthReport {
        let mut services = BTreeMap::new();

        let vector = match (self.index.stats().await, &self.readiness) {
            (Ok(stats), IndexReadiness::Ready) => {
                ServiceStatus::new(HealthStatus::Healthy, format!("Connected. Vectors: {}", stats.total_vector_count))
            }
            (Ok(stats), IndexReadiness::Degraded(reason)) => ServiceStatus::new(
                HealthStatus::Degraded,
                format!("Connected. Vectors: {} ({reason})", stats.total_vector_count),
            ),
            (Err(e), _) => {
                warn!(error = %e, "vector store health probe failed");
                ServiceStatus::new(HealthStatus::Unhealthy, e.to_string())
            }
        };
        services.insert(VECTOR_STORE.to_string(), vector);

        let embeddings = match self.embeddings.embed_one("test").await {
            Ok(_) => ServiceStatus::new(HealthStatus::Healthy, format!("API responding ({})", self.embeddings.model())),
            Err(e) => {
                warn!(error = %e, "embedding health probe failed");
                ServiceStatus::new(HealthStatus::Unhealthy, e.to_string())
            }
        };
        services.insert(EMBEDDINGS.to_string(), embeddings);

        services.insert(
            GENERATION.to_string(),
            ServiceStatus::new(
                HealthStatus::Healthy,
                format!("Service initialized ({}, {})", self.generation.model(), self.generation.profile()),
            ),
        );

        let status = if services.values().all(|s| s.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        HealthReport { status, services }
    }
}
