//! Runtime configurations carried by features.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Separator between a factory pid and the entry name inside a full pid.
pub const FACTORY_SEPARATOR: char = '~';

/// A configuration dictionary addressed by persistent identity.
///
/// Factory configurations carry the owning factory pid and encode the entry
/// as `factory~name` in [`Configuration::pid`]. A pid containing the
/// separator is normalized on construction and on deserialization, so
/// `is_factory` holds either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "ConfigurationRepr")]
pub struct Configuration {
    pub pid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factory_pid: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Configuration {
    pub fn new(pid: impl Into<String>) -> Self {
        Self::normalized(pid.into(), None, BTreeMap::new())
    }

    /// A factory configuration entry, addressed as `factory_pid~name`.
    pub fn factory(factory_pid: impl Into<String>, name: &str) -> Self {
        let factory_pid = factory_pid.into();
        let pid = format!("{factory_pid}{FACTORY_SEPARATOR}{name}");
        Self {
            pid,
            factory_pid: Some(factory_pid),
            properties: BTreeMap::new(),
        }
    }

    fn normalized(
        pid: String,
        factory_pid: Option<String>,
        properties: BTreeMap<String, Value>,
    ) -> Self {
        let factory_pid = factory_pid.or_else(|| {
            pid.split_once(FACTORY_SEPARATOR)
                .map(|(factory, _)| factory.to_string())
        });
        Self {
            pid,
            factory_pid,
            properties,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn is_factory(&self) -> bool {
        self.factory_pid.is_some()
    }

    /// Entry name of a factory configuration, the part after the separator.
    pub fn entry_name(&self) -> Option<&str> {
        self.pid
            .split_once(FACTORY_SEPARATOR)
            .map(|(_, name)| name)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ConfigurationRepr {
    pid: String,
    #[serde(default)]
    factory_pid: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

impl From<ConfigurationRepr> for Configuration {
    fn from(repr: ConfigurationRepr) -> Self {
        Configuration::normalized(repr.pid, repr.factory_pid, repr.properties)
    }
}
