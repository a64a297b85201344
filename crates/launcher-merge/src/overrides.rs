//! Clash override rules.
//!
//! Operators resolve merge clashes up front: module version clashes through
//! [`ArtifactOverrides`], configuration pid clashes through a
//! [`ConfigPolicy`] per pid (or the `*` wildcard).

use std::collections::HashMap;
use std::str::FromStr;

use launcher_model::ArtifactId;
use semver::Version;

use crate::error::{Error, Result};

/// Pid key matching every configuration without an exact policy entry.
pub const CONFIG_POLICY_WILDCARD: &str = "*";

/// How a module version clash for one `group:name` base is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideRule {
    /// Use exactly this version, whether or not a feature declared it.
    Pin(String),
    /// Keep the first declared version.
    First,
    /// Keep the highest declared version.
    Latest,
}

impl FromStr for OverrideRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first" | "FIRST" => Ok(OverrideRule::First),
            "latest" | "LATEST" => Ok(OverrideRule::Latest),
            "" => Err(Error::invalid_override(s, "rule must not be empty")),
            version => Ok(OverrideRule::Pin(version.to_string())),
        }
    }
}

/// Per-base override table consulted when two features declare different
/// versions of the same module.
#[derive(Debug, Clone, Default)]
pub struct ArtifactOverrides {
    rules: HashMap<(String, String), OverrideRule>,
}

impl ArtifactOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: impl Into<String>, name: impl Into<String>, rule: OverrideRule) {
        self.rules.insert((group.into(), name.into()), rule);
    }

    pub fn rule_for(&self, id: &ArtifactId) -> Option<&OverrideRule> {
        let (group, name) = id.base();
        self.rules.get(&(group.to_string(), name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Parses a `group:name=RULE` entry as passed on a command line, where
    /// RULE is `first`, `latest` or a concrete version.
    pub fn parse_entry(spec: &str) -> Result<((String, String), OverrideRule)> {
        let (base, rule) = spec
            .split_once('=')
            .ok_or_else(|| Error::invalid_override(spec, "expected group:name=RULE"))?;
        let (group, name) = base
            .split_once(':')
            .ok_or_else(|| Error::invalid_override(spec, "expected group:name before '='"))?;
        if group.is_empty() || name.is_empty() {
            return Err(Error::invalid_override(spec, "group and name must not be empty"));
        }
        Ok(((group.to_string(), name.to_string()), rule.parse()?))
    }
}

/// How a configuration pid declared by several features is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigPolicy {
    /// The first declaration wins, later ones are dropped.
    UseFirst,
    /// The latest declaration wins.
    #[default]
    UseLast,
    /// Properties are merged; on a key clash the first value wins.
    MergeFirst,
    /// Properties are merged; on a key clash the latest value wins.
    MergeLast,
}

impl FromStr for ConfigPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "use-first" => Ok(ConfigPolicy::UseFirst),
            "use-last" => Ok(ConfigPolicy::UseLast),
            "merge-first" => Ok(ConfigPolicy::MergeFirst),
            "merge-last" => Ok(ConfigPolicy::MergeLast),
            other => Err(Error::invalid_override(
                other,
                "expected use-first, use-last, merge-first or merge-last",
            )),
        }
    }
}

/// Picks the higher of two version strings, by semver where both parse and
/// by plain string comparison otherwise.
pub fn latest_version<'a>(a: &'a str, b: &'a str) -> &'a str {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(va), Ok(vb)) => {
            if vb > va {
                b
            } else {
                a
            }
        }
        _ => {
            if b > a {
                b
            } else {
                a
            }
        }
    }
}
