//! Operator-supplied merge inputs.

use std::collections::{BTreeMap, HashMap};

use launcher_model::ArtifactId;

use crate::extensions::{default_merge_handlers, ExtensionMergeHandler};
use crate::overrides::{ArtifactOverrides, ConfigPolicy, OverrideRule, CONFIG_POLICY_WILDCARD};
use crate::postprocess::{default_post_processors, PostProcessor};

/// Everything a merge needs besides the features themselves: the launch id,
/// clash overrides, operator-forced properties and variables, and the
/// handler chains. Custom handlers and processors run before the built-in
/// ones.
pub struct MergeContext {
    application_id: ArtifactId,
    artifact_overrides: ArtifactOverrides,
    config_policies: HashMap<String, ConfigPolicy>,
    framework_overrides: BTreeMap<String, String>,
    variable_overrides: BTreeMap<String, String>,
    custom_merge_handlers: Vec<Box<dyn ExtensionMergeHandler>>,
    default_merge_handlers: Vec<Box<dyn ExtensionMergeHandler>>,
    custom_post_processors: Vec<Box<dyn PostProcessor>>,
    default_post_processors: Vec<Box<dyn PostProcessor>>,
}

impl MergeContext {
    pub fn new(application_id: ArtifactId) -> Self {
        Self {
            application_id,
            artifact_overrides: ArtifactOverrides::new(),
            config_policies: HashMap::new(),
            framework_overrides: BTreeMap::new(),
            variable_overrides: BTreeMap::new(),
            custom_merge_handlers: Vec::new(),
            default_merge_handlers: default_merge_handlers(),
            custom_post_processors: Vec::new(),
            default_post_processors: default_post_processors(),
        }
    }

    pub fn application_id(&self) -> &ArtifactId {
        &self.application_id
    }

    pub fn with_artifact_override(
        mut self,
        group: impl Into<String>,
        name: impl Into<String>,
        rule: OverrideRule,
    ) -> Self {
        self.artifact_overrides.insert(group, name, rule);
        self
    }

    /// Policy for one pid, or for every pid without an exact entry via the
    /// [`CONFIG_POLICY_WILDCARD`] key.
    pub fn with_config_policy(mut self, pid: impl Into<String>, policy: ConfigPolicy) -> Self {
        self.config_policies.insert(pid.into(), policy);
        self
    }

    /// Forces a framework property. Operator values are seeded before any
    /// feature is merged, so under first-wins they always take precedence.
    pub fn with_framework_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.framework_overrides.insert(key.into(), value.into());
        self
    }

    /// Forces a variable value, overriding whatever the features declare.
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variable_overrides.insert(key.into(), value.into());
        self
    }

    pub fn with_merge_handler(mut self, handler: Box<dyn ExtensionMergeHandler>) -> Self {
        self.custom_merge_handlers.push(handler);
        self
    }

    pub fn with_post_processor(mut self, processor: Box<dyn PostProcessor>) -> Self {
        self.custom_post_processors.push(processor);
        self
    }

    pub(crate) fn artifact_rule(&self, id: &ArtifactId) -> Option<&OverrideRule> {
        self.artifact_overrides.rule_for(id)
    }

    pub(crate) fn config_policy_for(&self, pid: &str) -> ConfigPolicy {
        self.config_policies
            .get(pid)
            .or_else(|| self.config_policies.get(CONFIG_POLICY_WILDCARD))
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn framework_overrides(&self) -> &BTreeMap<String, String> {
        &self.framework_overrides
    }

    pub(crate) fn variable_overrides(&self) -> &BTreeMap<String, String> {
        &self.variable_overrides
    }

    pub(crate) fn merge_handlers(&self) -> impl Iterator<Item = &dyn ExtensionMergeHandler> {
        self.custom_merge_handlers
            .iter()
            .chain(self.default_merge_handlers.iter())
            .map(Box::as_ref)
    }

    pub(crate) fn post_processors(&self) -> impl Iterator<Item = &dyn PostProcessor> {
        self.custom_post_processors
            .iter()
            .chain(self.default_post_processors.iter())
            .map(Box::as_ref)
    }
}
