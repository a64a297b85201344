//! Extension payloads.
//!
//! Extensions carry everything a feature declares beyond modules and
//! configurations. The launcher core does not interpret them: merge handlers
//! combine same-named extensions across features, and dispatch handlers
//! translate the merged result into launch instructions. A required extension
//! nobody handles aborts the launch.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::ArtifactId;

/// The three payload shapes an extension can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    Text,
    Json,
    Artifacts,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExtensionKind::Text => "text",
            ExtensionKind::Json => "json",
            ExtensionKind::Artifacts => "artifacts",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum ExtensionPayload {
    Text(String),
    Json(Value),
    Artifacts(Vec<ArtifactId>),
}

impl ExtensionPayload {
    pub fn kind(&self) -> ExtensionKind {
        match self {
            ExtensionPayload::Text(_) => ExtensionKind::Text,
            ExtensionPayload::Json(_) => ExtensionKind::Json,
            ExtensionPayload::Artifacts(_) => ExtensionKind::Artifacts,
        }
    }
}

/// A named extension with its payload and the required flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(flatten)]
    pub payload: ExtensionPayload,
}

impl Extension {
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            payload: ExtensionPayload::Text(text.into()),
        }
    }

    pub fn json(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            required: false,
            payload: ExtensionPayload::Json(value),
        }
    }

    pub fn artifacts(name: impl Into<String>, ids: Vec<ArtifactId>) -> Self {
        Self {
            name: name.into(),
            required: false,
            payload: ExtensionPayload::Artifacts(ids),
        }
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn kind(&self) -> ExtensionKind {
        self.payload.kind()
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            ExtensionPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match &self.payload {
            ExtensionPayload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_artifacts(&self) -> Option<&[ArtifactId]> {
        match &self.payload {
            ExtensionPayload::Artifacts(ids) => Some(ids),
            _ => None,
        }
    }
}
