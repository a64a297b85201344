//! Module references inside a feature.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactId;

/// Metadata key a feature author can set to suggest a start level. The merge
/// engine folds the hint into [`ModuleRef::start_order`] after merging.
pub const START_LEVEL_HINT: &str = "start-level";

/// A module to install, with its start ordering and free-form metadata.
///
/// A `start_order` of 0 means "no explicit order": the runtime's default
/// start level applies when the module is installed. Descriptors may write a
/// module entry as a bare artifact id string or as an object with
/// `start-order` and `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "ModuleRefRepr")]
pub struct ModuleRef {
    pub id: ArtifactId,
    #[serde(default)]
    pub start_order: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ModuleRef {
    pub fn new(id: ArtifactId) -> Self {
        Self {
            id,
            start_order: 0,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_start_order(mut self, start_order: u32) -> Self {
        self.start_order = start_order;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// True when no explicit start order was declared.
    pub fn has_default_order(&self) -> bool {
        self.start_order == 0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModuleRefRepr {
    Bare(ArtifactId),
    Entry {
        id: ArtifactId,
        #[serde(default, rename = "start-order")]
        start_order: u32,
        #[serde(default)]
        metadata: BTreeMap<String, String>,
    },
}

impl From<ModuleRefRepr> for ModuleRef {
    fn from(repr: ModuleRefRepr) -> Self {
        match repr {
            ModuleRefRepr::Bare(id) => ModuleRef::new(id),
            ModuleRefRepr::Entry {
                id,
                start_order,
                metadata,
            } => ModuleRef {
                id,
                start_order,
                metadata,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserializes_bare_id_string() {
        let module: ModuleRef = serde_json::from_str("\"g:n:1.0\"").unwrap();
        assert_eq!(module.id.to_string(), "g:n:1.0");
        assert_eq!(module.start_order, 0);
        assert!(module.has_default_order());
    }

    #[test]
    fn test_deserializes_full_entry() {
        let json = r#"{"id": "g:n:1.0", "start-order": 5, "metadata": {"start-level": "8"}}"#;
        let module: ModuleRef = serde_json::from_str(json).unwrap();
        assert_eq!(module.start_order, 5);
        assert_eq!(module.metadata.get(START_LEVEL_HINT).map(String::as_str), Some("8"));
    }

    #[test]
    fn test_serializes_kebab_case_fields() {
        let module = ModuleRef::new("g:n:1.0".parse().unwrap()).with_start_order(3);
        let json = serde_json::to_value(&module).unwrap();
        assert_eq!(json["start-order"], 3);
        assert!(json.get("metadata").is_none());
    }
}
