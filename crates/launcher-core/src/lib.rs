//! Launch orchestration for merged feature applications.
//!
//! The pipeline runs in three steps, all pure until the last one:
//!
//! 1. [`dispatch`] offers every extension of a merged application to a
//!    handler chain, collecting extra modules, configurations, installables
//!    and framework properties.
//! 2. [`plan`] resolves artifact content through an
//!    [`ArtifactSupplier`](supply::ArtifactSupplier) and freezes everything
//!    into a [`LaunchPlan`](plan::LaunchPlan).
//! 3. [`orchestrator`] drives the plan against any
//!    [`ModuleRuntime`](runtime::ModuleRuntime), handling capability
//!    watchers, start-level walking, restarts and shutdown.

pub mod dispatch;
pub mod error;
pub mod hold;
pub mod orchestrator;
pub mod plan;
pub mod runtime;
pub mod state;
pub mod supply;

pub use dispatch::{DispatchContext, DispatchOutcome, ExtensionDispatcher, ExtensionHandler};
pub use error::{Error, Result};
pub use hold::{HoldGuard, StartupHold};
pub use orchestrator::{InstallFailurePolicy, Orchestrator};
pub use plan::{LaunchPlan, PlannedArtifact, PlannedModule};
pub use runtime::{
    ArtifactInstaller, Capability, CapabilityWatcher, ConfigurationSink, InstallMode, ModuleHandle,
    ModuleRuntime, ModuleState, RuntimeError, StopReason, StopResult, WatchHandle,
};
pub use state::{InstalledModule, Phase};
pub use supply::{ArtifactSupplier, SupplyError};
