//! Artifact supply.

use std::path::PathBuf;

use launcher_model::ArtifactId;
use thiserror::Error;

/// Failure to produce local content for an artifact id.
#[derive(Debug, Error)]
#[error("Artifact {id} unavailable: {reason}")]
pub struct SupplyError {
    pub id: ArtifactId,
    pub reason: String,
}

impl SupplyError {
    pub fn new(id: ArtifactId, reason: impl Into<String>) -> Self {
        Self {
            id,
            reason: reason.into(),
        }
    }
}

/// Resolves artifact ids to local files while a plan is built.
///
/// The planner calls this once per planned module and installable; a supplier
/// that cannot produce the artifact fails the whole plan.
pub trait ArtifactSupplier: Send + Sync {
    fn supply(&self, id: &ArtifactId) -> Result<PathBuf, SupplyError>;
}
