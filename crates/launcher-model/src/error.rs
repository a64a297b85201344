//! Error types for the descriptor model.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid artifact id '{id}': {reason}")]
    InvalidArtifactId { id: String, reason: String },

    #[error("Invalid feature descriptor: {0}")]
    Descriptor(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArtifactId {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
