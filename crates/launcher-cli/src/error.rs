//! Error types for the launcher CLI.

use std::path::PathBuf;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read feature descriptor {path}: {source}")]
    FeatureRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid feature descriptor {path}: {source}")]
    FeatureParse {
        path: PathBuf,
        source: launcher_model::Error,
    },

    #[error("Invalid configuration file {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Model(#[from] launcher_model::Error),

    #[error(transparent)]
    Merge(#[from] launcher_merge::Error),

    #[error(transparent)]
    Launch(#[from] launcher_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Process exit code: 2 for input and assembly problems, 1 for failures
    /// during the launch itself.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Launch(_) | CliError::Io(_) => 1,
            _ => 2,
        }
    }
}
