//! Data model for feature descriptors.
//!
//! A feature is the unit of deployment the launcher works with: modules to
//! install, configurations to apply, framework properties, variables, and
//! opaque extension payloads. Several features are merged into a single
//! [`Application`] before anything touches a runtime. This crate defines the
//! descriptor types plus the variable resolver shared by the merge engine and
//! the launch planner.

pub mod artifact;
pub mod config;
pub mod error;
pub mod extension;
pub mod feature;
pub mod module;
pub mod variables;

pub use artifact::ArtifactId;
pub use config::Configuration;
pub use error::{Error, Result};
pub use extension::{Extension, ExtensionKind, ExtensionPayload};
pub use feature::{Application, Feature};
pub use module::ModuleRef;
