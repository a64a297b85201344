//! Feature merge engine.
//!
//! Takes an ordered list of features plus operator-supplied overrides and
//! produces a single [`Application`](launcher_model::Application). Input
//! order is authoritative: module positions, configuration policies and
//! variable precedence are all defined in terms of it. Merging is pure; no
//! runtime is touched here.

pub mod context;
pub mod engine;
pub mod error;
pub mod extensions;
pub mod overrides;
pub mod postprocess;

pub use context::MergeContext;
pub use engine::merge;
pub use error::{Error, Result};
pub use extensions::ExtensionMergeHandler;
pub use overrides::{ArtifactOverrides, ConfigPolicy, OverrideRule};
pub use postprocess::PostProcessor;
