//! Error types for the merge engine.

use launcher_model::ArtifactId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "Module clash for '{group}:{name}': version {existing} (from {existing_feature}) \
         against {incoming} (from {incoming_feature}) with no override"
    )]
    ModuleVersionConflict {
        group: String,
        name: String,
        existing: String,
        existing_feature: ArtifactId,
        incoming: String,
        incoming_feature: ArtifactId,
    },

    #[error("Launch id '{id}' collides with an input feature id")]
    ApplicationIdCollision { id: ArtifactId },

    #[error("Invalid clash override '{value}': {reason}")]
    InvalidOverride { value: String, reason: String },
}

impl Error {
    pub(crate) fn invalid_override(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOverride {
            value: value.into(),
            reason: reason.into(),
        }
    }
}
