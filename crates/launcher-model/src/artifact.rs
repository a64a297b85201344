//! Artifact coordinates.
//!
//! Every deployable resource the launcher handles is addressed by an
//! [`ArtifactId`]: group, name and version, with optional classifier and
//! kind. The canonical string form is `group:name:version[:classifier[:kind]]`
//! and descriptors serialize ids as that string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Package kind assumed when an id does not carry one.
pub const DEFAULT_KIND: &str = "pkg";

/// Coordinates of a deployable artifact.
///
/// Two ids are equal only when all five coordinates match. Version ordering is
/// deliberately not part of identity; clash resolution during merge decides
/// which version of a module wins.
///
/// # Example
///
/// ```
/// use launcher_model::ArtifactId;
///
/// let id: ArtifactId = "org.example:runtime:1.4.0".parse().unwrap();
/// assert_eq!(id.group(), "org.example");
/// assert_eq!(id.version(), "1.4.0");
/// assert_eq!(id.to_string(), "org.example:runtime:1.4.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId {
    group: String,
    name: String,
    version: String,
    classifier: Option<String>,
    kind: Option<String>,
}

impl ArtifactId {
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
            classifier: None,
            kind: None,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Same coordinates with a different version. Used when a clash override
    /// pins a version that none of the declaring features carried verbatim.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Identity without the version, the unit of clash detection during merge.
    pub fn base(&self) -> (&str, &str) {
        (&self.group, &self.name)
    }

    /// Conventional file name of the artifact:
    /// `name-version[-classifier].kind`.
    pub fn file_name(&self) -> String {
        let kind = self.kind.as_deref().unwrap_or(DEFAULT_KIND);
        match &self.classifier {
            Some(classifier) => {
                format!("{}-{}-{}.{}", self.name, self.version, classifier, kind)
            }
            None => format!("{}-{}.{}", self.name, self.version, kind),
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        match (&self.classifier, &self.kind) {
            (Some(classifier), Some(kind)) => write!(f, ":{classifier}:{kind}"),
            (Some(classifier), None) => write!(f, ":{classifier}"),
            // An empty classifier segment keeps the kind position stable.
            (None, Some(kind)) => write!(f, "::{kind}"),
            (None, None) => Ok(()),
        }
    }
}

impl FromStr for ArtifactId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split(':').collect();
        if !(3..=5).contains(&segments.len()) {
            return Err(Error::invalid_id(
                s,
                "expected group:name:version[:classifier[:kind]]",
            ));
        }
        for (index, label) in ["group", "name", "version"].iter().enumerate() {
            if segments[index].is_empty() {
                return Err(Error::invalid_id(s, format!("{label} must not be empty")));
            }
        }
        let non_empty = |segment: &&str| -> Option<String> {
            (!segment.is_empty()).then(|| (*segment).to_string())
        };
        Ok(Self {
            group: segments[0].to_string(),
            name: segments[1].to_string(),
            version: segments[2].to_string(),
            classifier: segments.get(3).and_then(non_empty),
            kind: segments.get(4).and_then(non_empty),
        })
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_parses_plain_id() {
        let id: ArtifactId = "org.example:core:2.1.0".parse().unwrap();
        assert_eq!(id.group(), "org.example");
        assert_eq!(id.name(), "core");
        assert_eq!(id.version(), "2.1.0");
        assert_eq!(id.classifier(), None);
        assert_eq!(id.kind(), None);
    }

    #[test]
    fn test_parses_classifier_and_kind() {
        let id: ArtifactId = "g:n:1.0:sources:zip".parse().unwrap();
        assert_eq!(id.classifier(), Some("sources"));
        assert_eq!(id.kind(), Some("zip"));
        assert_eq!(id.to_string(), "g:n:1.0:sources:zip");
    }

    #[test]
    fn test_empty_classifier_segment_keeps_kind() {
        let id: ArtifactId = "g:n:1.0::zip".parse().unwrap();
        assert_eq!(id.classifier(), None);
        assert_eq!(id.kind(), Some("zip"));
        assert_eq!(id.to_string(), "g:n:1.0::zip");
    }

    #[rstest]
    #[case("g:n")]
    #[case("g:n:1.0:c:k:extra")]
    #[case(":n:1.0")]
    #[case("g::1.0")]
    #[case("g:n:")]
    fn test_rejects_malformed_ids(#[case] input: &str) {
        assert!(input.parse::<ArtifactId>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for input in ["g:n:1.0", "g:n:1.0:c", "g:n:1.0:c:k", "g:n:1.0::k"] {
            let id: ArtifactId = input.parse().unwrap();
            assert_eq!(id.to_string(), input);
            let again: ArtifactId = id.to_string().parse().unwrap();
            assert_eq!(again, id);
        }
    }

    #[test]
    fn test_file_name_uses_default_kind() {
        let id = ArtifactId::new("g", "runtime", "1.2.3");
        assert_eq!(id.file_name(), "runtime-1.2.3.pkg");
        let classified = id.with_classifier("linux").with_kind("tar");
        assert_eq!(classified.file_name(), "runtime-1.2.3-linux.tar");
    }

    #[test]
    fn test_serializes_as_canonical_string() {
        let id = ArtifactId::new("g", "n", "1.0").with_kind("zip");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"g:n:1.0::zip\"");
        let back: ArtifactId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_base_ignores_version() {
        let a = ArtifactId::new("g", "n", "1.0");
        let b = ArtifactId::new("g", "n", "2.0");
        assert_eq!(a.base(), b.base());
        assert_ne!(a, b);
    }
}
