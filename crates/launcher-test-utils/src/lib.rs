//! Shared test fixtures for the launcher workspace.
//!
//! Provides a compact feature builder, a path-only artifact supplier, and
//! [`ScriptedRuntime`], a fully scriptable
//! [`ModuleRuntime`](launcher_core::ModuleRuntime) double that records every
//! call the orchestrator makes.

pub mod features;
pub mod runtime;
pub mod supply;

pub use features::{artifact, feature, FeatureBuilder};
pub use runtime::{AppliedConfiguration, InstallRecord, ScriptedRuntime};
pub use supply::StubSupplier;
