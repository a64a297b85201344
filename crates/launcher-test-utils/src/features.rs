//! Feature descriptor builders.

use launcher_model::{ArtifactId, Configuration, Extension, Feature, ModuleRef};
use serde_json::Value;

/// Parses an artifact id, panicking on malformed test input.
pub fn artifact(id: &str) -> ArtifactId {
    id.parse().expect("valid artifact id")
}

/// Starts building a feature with the given id.
pub fn feature(id: &str) -> FeatureBuilder {
    FeatureBuilder {
        feature: Feature::new(artifact(id)),
    }
}

/// Fluent builder over [`Feature`] for test setups.
pub struct FeatureBuilder {
    feature: Feature,
}

impl FeatureBuilder {
    pub fn module(mut self, id: &str) -> Self {
        self.feature.modules.push(ModuleRef::new(artifact(id)));
        self
    }

    pub fn module_at(mut self, id: &str, start_order: u32) -> Self {
        self.feature
            .modules
            .push(ModuleRef::new(artifact(id)).with_start_order(start_order));
        self
    }

    pub fn module_with(mut self, module: ModuleRef) -> Self {
        self.feature.modules.push(module);
        self
    }

    /// Sets one property on the configuration with this pid, creating the
    /// configuration on first use.
    pub fn config(mut self, pid: &str, key: &str, value: impl Into<Value>) -> Self {
        if let Some(existing) = self
            .feature
            .configurations
            .iter_mut()
            .find(|c| c.pid == pid)
        {
            existing.properties.insert(key.to_string(), value.into());
        } else {
            self.feature
                .configurations
                .push(Configuration::new(pid).with_property(key, value));
        }
        self
    }

    pub fn factory_config(
        mut self,
        factory_pid: &str,
        name: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Self {
        self.feature
            .configurations
            .push(Configuration::factory(factory_pid, name).with_property(key, value));
        self
    }

    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.feature
            .framework_properties
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn variable(mut self, key: &str, value: &str) -> Self {
        self.feature
            .variables
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn extension(mut self, extension: Extension) -> Self {
        self.feature.extensions.push(extension);
        self
    }

    pub fn build(self) -> Feature {
        self.feature
    }
}
