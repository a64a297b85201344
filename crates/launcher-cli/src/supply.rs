//! Artifact supply from a local cache directory.

use std::path::PathBuf;

use launcher_core::{ArtifactSupplier, SupplyError};
use launcher_model::ArtifactId;
use tracing::trace;

/// Resolves artifacts against `<root>/<group>/<file name>`.
///
/// Purely local: an artifact missing from the cache fails the plan. Whatever
/// populates the cache (a build, a deployment pipeline) runs beforehand.
pub struct CacheDirSupplier {
    root: PathBuf,
}

impl CacheDirSupplier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, id: &ArtifactId) -> PathBuf {
        self.root.join(id.group()).join(id.file_name())
    }
}

impl ArtifactSupplier for CacheDirSupplier {
    fn supply(&self, id: &ArtifactId) -> Result<PathBuf, SupplyError> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(SupplyError::new(
                id.clone(),
                format!("not in cache at {}", path.display()),
            ));
        }
        trace!(artifact = %id, path = %path.display(), "Artifact resolved from cache");
        Ok(path)
    }
}
