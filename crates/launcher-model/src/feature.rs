//! Feature and application descriptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactId;
use crate::config::Configuration;
use crate::error::Result;
use crate::extension::Extension;
use crate::module::ModuleRef;

/// A deployable unit as written by a feature author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Feature {
    pub id: ArtifactId,
    #[serde(default)]
    pub modules: Vec<ModuleRef>,
    #[serde(default)]
    pub configurations: Vec<Configuration>,
    #[serde(default)]
    pub framework_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

impl Feature {
    pub fn new(id: ArtifactId) -> Self {
        Self {
            id,
            modules: Vec::new(),
            configurations: Vec::new(),
            framework_properties: BTreeMap::new(),
            variables: BTreeMap::new(),
            extensions: Vec::new(),
        }
    }

    /// Parses a JSON feature descriptor.
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn find_extension(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name == name)
    }
}

/// The result of merging features.
///
/// Same shape as a feature, but guaranteed free of module and configuration
/// clashes, with variables already applied to configuration values and
/// framework property values. The id is the launch id chosen by the caller
/// and never collides with an input feature id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Application {
    pub id: ArtifactId,
    #[serde(default)]
    pub modules: Vec<ModuleRef>,
    #[serde(default)]
    pub configurations: Vec<Configuration>,
    #[serde(default)]
    pub framework_properties: BTreeMap<String, String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

impl Application {
    pub fn new(id: ArtifactId) -> Self {
        Self {
            id,
            modules: Vec::new(),
            configurations: Vec::new(),
            framework_properties: BTreeMap::new(),
            variables: BTreeMap::new(),
            extensions: Vec::new(),
        }
    }

    pub fn find_extension(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name == name)
    }

    /// Serializes the application the way `--assemble-only` writes it.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
