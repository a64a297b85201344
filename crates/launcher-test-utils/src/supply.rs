//! Path-only artifact supply for tests.

use std::collections::HashSet;
use std::path::PathBuf;

use launcher_core::{ArtifactSupplier, SupplyError};
use launcher_model::ArtifactId;

/// Supplies deterministic virtual paths without touching the filesystem.
/// Individual ids can be scripted to fail.
pub struct StubSupplier {
    root: PathBuf,
    failing: HashSet<String>,
}

impl StubSupplier {
    pub fn new() -> Self {
        Self::rooted("/virtual/artifacts")
    }

    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            failing: HashSet::new(),
        }
    }

    pub fn failing_for(mut self, id: ArtifactId) -> Self {
        self.failing.insert(id.to_string());
        self
    }
}

impl Default for StubSupplier {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactSupplier for StubSupplier {
    fn supply(&self, id: &ArtifactId) -> Result<PathBuf, SupplyError> {
        if self.failing.contains(&id.to_string()) {
            return Err(SupplyError::new(id.clone(), "scripted supply failure"));
        }
        Ok(self.root.join(id.file_name()))
    }
}
