//! The module runtime contract.
//!
//! A runtime is anything that can install and start modules, walk start
//! levels, and report when it stopped: a process host, a plugin engine, or
//! the in-crate sandbox used by the CLI. The orchestrator drives a runtime
//! exclusively through [`ModuleRuntime`]; nothing in the launcher links
//! against a concrete runtime.
//!
//! Capabilities that appear only once the runtime is partially started
//! (accepting configurations, installing non-module artifacts) are modeled
//! explicitly: [`ModuleRuntime::watch_capability`] registers named callbacks
//! and the typed accessors return `None` until the capability exists. There
//! is no dynamic discovery; a runtime either implements a capability or it
//! does not.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

use crate::plan::{PlannedArtifact, PlannedModule};

/// Error reported by a runtime implementation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RuntimeError {
    message: String,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// How module content is handed to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// Install by referencing the artifact in place.
    Reference,
    /// Hand the runtime a copy to manage itself.
    Copy,
}

/// Runtime-assigned identity of an installed module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHandle {
    pub symbolic_name: String,
    pub version: String,
    /// Host module name for attached modules. An attached module is resolved
    /// against its host and must never be started on its own.
    pub attached_to: Option<String>,
}

impl ModuleHandle {
    pub fn new(symbolic_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version: version.into(),
            attached_to: None,
        }
    }

    pub fn attached(
        symbolic_name: impl Into<String>,
        version: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version: version.into(),
            attached_to: Some(host.into()),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached_to.is_some()
    }
}

/// Lifecycle state of an installed module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Installed,
    Resolved,
    Active,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ModuleState::Installed => "installed",
            ModuleState::Resolved => "resolved",
            ModuleState::Active => "active",
        };
        f.write_str(label)
    }
}

/// A capability a runtime may grow during startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The runtime accepts configuration dictionaries.
    Configuration,
    /// The runtime installs non-module artifacts.
    Installer,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Capability::Configuration => "configuration",
            Capability::Installer => "installer",
        };
        f.write_str(label)
    }
}

/// Why a runtime stopped, and the exit code the launcher should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ordinary shutdown. Terminal.
    Shutdown,
    /// The runtime stopped to apply an update and wants to be relaunched.
    Update,
    /// The runtime failed. Terminal.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopResult {
    pub reason: StopReason,
    pub exit_code: i32,
}

impl StopResult {
    pub fn shutdown() -> Self {
        Self {
            reason: StopReason::Shutdown,
            exit_code: 0,
        }
    }

    pub fn update() -> Self {
        Self {
            reason: StopReason::Update,
            exit_code: 0,
        }
    }

    pub fn error(exit_code: i32) -> Self {
        Self {
            reason: StopReason::Error,
            exit_code,
        }
    }
}

/// Accepts configuration dictionaries once the runtime can hold them.
pub trait ConfigurationSink: Send + Sync {
    fn create_or_update(
        &self,
        pid: &str,
        factory_pid: Option<&str>,
        properties: &BTreeMap<String, Value>,
    ) -> Result<(), RuntimeError>;
}

/// Installs non-module artifacts once the runtime can take them.
pub trait ArtifactInstaller: Send + Sync {
    /// Installs the whole batch in one call.
    fn install_all(&self, artifacts: &[PlannedArtifact]) -> Result<(), RuntimeError>;
}

type WatcherCallback = Box<dyn Fn(&dyn ModuleRuntime) + Send + Sync>;

/// Named callbacks invoked by the runtime when a watched capability appears
/// or goes away. Runtimes call [`notify_appear`] / [`notify_remove`]; the
/// registering side never polls.
///
/// [`notify_appear`]: CapabilityWatcher::notify_appear
/// [`notify_remove`]: CapabilityWatcher::notify_remove
pub struct CapabilityWatcher {
    name: &'static str,
    on_appear: WatcherCallback,
    on_remove: Option<WatcherCallback>,
}

impl CapabilityWatcher {
    pub fn new(
        name: &'static str,
        on_appear: impl Fn(&dyn ModuleRuntime) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            on_appear: Box::new(on_appear),
            on_remove: None,
        }
    }

    pub fn with_on_remove(
        mut self,
        on_remove: impl Fn(&dyn ModuleRuntime) + Send + Sync + 'static,
    ) -> Self {
        self.on_remove = Some(Box::new(on_remove));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn notify_appear(&self, runtime: &dyn ModuleRuntime) {
        (self.on_appear)(runtime);
    }

    pub fn notify_remove(&self, runtime: &dyn ModuleRuntime) {
        if let Some(on_remove) = &self.on_remove {
            on_remove(runtime);
        }
    }
}

impl fmt::Debug for CapabilityWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityWatcher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Cancels a capability watch registration.
pub struct WatchHandle {
    cancel: Box<dyn FnOnce() + Send>,
}

impl WatchHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Stops delivery of further capability events to the watcher.
    pub fn cancel(self) {
        (self.cancel)()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle").finish_non_exhaustive()
    }
}

/// The contract every runtime implements.
///
/// All module and level operations are synchronous requests: `set_level`
/// asks the runtime to move and returns; actual progress is reported through
/// [`level_events`]. The only long wait, [`wait_for_stop`], is async so the
/// orchestrator can race it against level progress and its startup timeout.
///
/// [`level_events`]: ModuleRuntime::level_events
/// [`wait_for_stop`]: ModuleRuntime::wait_for_stop
#[async_trait]
pub trait ModuleRuntime: Send + Sync {
    /// Start level given to modules installed without an explicit order.
    fn default_start_level(&self) -> u32;

    /// Whether modules can be installed by reference instead of by copy.
    fn supports_reference_install(&self) -> bool {
        false
    }

    fn install(
        &self,
        module: &PlannedModule,
        start_level: u32,
        mode: InstallMode,
    ) -> Result<ModuleHandle, RuntimeError>;

    fn start_module(&self, handle: &ModuleHandle) -> Result<(), RuntimeError>;

    fn module_state(&self, handle: &ModuleHandle) -> Result<ModuleState, RuntimeError>;

    /// Boots the runtime at level 0.
    fn start(&self) -> Result<(), RuntimeError>;

    /// Requests an orderly stop. Completion is reported via [`wait_for_stop`].
    ///
    /// [`wait_for_stop`]: ModuleRuntime::wait_for_stop
    fn stop(&self) -> Result<(), RuntimeError>;

    /// Requests a move to `level`. Safe to repeat with the same value.
    fn set_level(&self, level: u32) -> Result<(), RuntimeError>;

    fn current_level(&self) -> u32;

    /// Receiver of reached start levels.
    fn level_events(&self) -> watch::Receiver<u32>;

    /// Resolves once the runtime stops. Each call observes one stop event.
    async fn wait_for_stop(&self) -> StopResult;

    /// The configuration sink, once the capability exists.
    fn configuration_sink(&self) -> Option<Arc<dyn ConfigurationSink>>;

    /// The artifact installer, once the capability exists.
    fn artifact_installer(&self) -> Option<Arc<dyn ArtifactInstaller>>;

    /// Registers a watcher. A capability that is already present triggers
    /// `notify_appear` during registration.
    fn watch_capability(
        &self,
        capability: Capability,
        watcher: CapabilityWatcher,
    ) -> Result<WatchHandle, RuntimeError>;
}
