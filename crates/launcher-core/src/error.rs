//! Error types for dispatch, planning and orchestration.

use std::time::Duration;

use launcher_model::ArtifactId;
use thiserror::Error;

use crate::runtime::RuntimeError;
use crate::supply::SupplyError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Required extension '{name}' was not handled by any registered handler")]
    UnhandledRequiredExtension { name: String },

    #[error("Extension '{name}' must carry a {expected} payload")]
    ExtensionPayload { name: String, expected: &'static str },

    #[error("Duplicate configuration pid '{pid}' in launch plan")]
    DuplicateConfigurationPid { pid: String },

    #[error("Invalid value '{value}' for property {key}")]
    InvalidProperty { key: &'static str, value: String },

    #[error(transparent)]
    Supply(#[from] SupplyError),

    #[error("Module {id} failed to install or start: {source}")]
    ModuleInstall { id: ArtifactId, source: RuntimeError },

    #[error("Runtime did not reach level {target} within {}s", timeout.as_secs())]
    LaunchTimeout { target: u32, timeout: Duration },

    #[error("Modules failed to reach the active state: {}", modules.join(", "))]
    ModulesNotActive { modules: Vec<String> },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
