//! Launch plans.
//!
//! A plan is the immutable result of assembly: modules and installables with
//! local paths supplied, configurations validated for pid uniqueness, and
//! framework properties after the final substitution pass. Orchestration
//! never mutates a plan; restart attempts rebuild their queues from it.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use launcher_model::{variables, Application, ArtifactId, Configuration};
use tracing::debug;

use crate::dispatch::DispatchOutcome;
use crate::error::{Error, Result};
use crate::supply::ArtifactSupplier;

/// Start level the runtime walks to before the launch counts as active.
pub const PROP_TARGET_LEVEL: &str = "runtime.target.level";

/// Startup wait bound in seconds.
pub const PROP_START_TIMEOUT: &str = "launcher.start.timeout";

/// Seconds to wait for a stop confirmation when the launcher aborts.
pub const PROP_SHUTDOWN_GRACE: &str = "launcher.shutdown.grace";

/// When `true`, modules still not active after startup fail the launch.
pub const PROP_FAIL_ON_ERROR: &str = "launcher.fail.on.error";

pub const DEFAULT_TARGET_LEVEL: u32 = 30;
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

/// Maps a declared start order to the level used at install time: 0 means
/// the runtime's default start level.
pub fn effective_level(start_order: u32, default_level: u32) -> u32 {
    if start_order == 0 {
        default_level
    } else {
        start_order
    }
}

/// A module with its content supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedModule {
    pub id: ArtifactId,
    pub start_order: u32,
    pub path: PathBuf,
}

/// A non-module artifact with its content supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedArtifact {
    pub id: ArtifactId,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LaunchPlan {
    modules: Vec<PlannedModule>,
    configurations: Vec<Configuration>,
    installables: Vec<PlannedArtifact>,
    framework_properties: BTreeMap<String, String>,
    target_level: u32,
    start_timeout: Duration,
    shutdown_grace: Duration,
    fail_on_error: bool,
}

impl LaunchPlan {
    /// Builds the plan for `application` plus whatever dispatch produced.
    ///
    /// Framework properties get a second substitution pass here, resolving
    /// `${...}` tokens against the property map itself and rewriting the
    /// `{dollar}` escape, so values computed from variables during merge can
    /// still be composed at the property level.
    ///
    /// # Errors
    ///
    /// Fails when the supplier cannot produce an artifact, when two
    /// configurations share a pid, or when a well-known property does not
    /// parse.
    pub fn build(
        application: &Application,
        dispatched: DispatchOutcome,
        supplier: &dyn ArtifactSupplier,
    ) -> Result<Self> {
        let mut modules = Vec::with_capacity(application.modules.len() + dispatched.modules.len());
        for module in application.modules.iter().chain(dispatched.modules.iter()) {
            let path = supplier.supply(&module.id)?;
            modules.push(PlannedModule {
                id: module.id.clone(),
                start_order: module.start_order,
                path,
            });
        }

        let mut configurations =
            Vec::with_capacity(application.configurations.len() + dispatched.configurations.len());
        let mut seen_pids: HashSet<String> = HashSet::new();
        for configuration in application
            .configurations
            .iter()
            .chain(dispatched.configurations.iter())
        {
            if !seen_pids.insert(configuration.pid.clone()) {
                return Err(Error::DuplicateConfigurationPid {
                    pid: configuration.pid.clone(),
                });
            }
            configurations.push(configuration.clone());
        }

        let mut installables = Vec::with_capacity(dispatched.installables.len());
        for id in &dispatched.installables {
            let path = supplier.supply(id)?;
            installables.push(PlannedArtifact {
                id: id.clone(),
                path,
            });
        }

        let mut raw_properties = application.framework_properties.clone();
        for (key, value) in dispatched.framework_properties {
            raw_properties.insert(key, value);
        }
        let lookup = |name: &str| raw_properties.get(name).cloned();
        let framework_properties: BTreeMap<String, String> = raw_properties
            .iter()
            .map(|(key, value)| {
                (
                    key.clone(),
                    variables::unescape(&variables::resolve(value, &lookup)),
                )
            })
            .collect();

        let target_level =
            parse_property(&framework_properties, PROP_TARGET_LEVEL, DEFAULT_TARGET_LEVEL)?;
        let start_timeout = Duration::from_secs(parse_property(
            &framework_properties,
            PROP_START_TIMEOUT,
            DEFAULT_START_TIMEOUT.as_secs(),
        )?);
        let shutdown_grace = Duration::from_secs(parse_property(
            &framework_properties,
            PROP_SHUTDOWN_GRACE,
            DEFAULT_SHUTDOWN_GRACE.as_secs(),
        )?);
        let fail_on_error = parse_property(&framework_properties, PROP_FAIL_ON_ERROR, false)?;

        debug!(
            modules = modules.len(),
            configurations = configurations.len(),
            installables = installables.len(),
            target_level,
            "Launch plan built"
        );

        Ok(Self {
            modules,
            configurations,
            installables,
            framework_properties,
            target_level,
            start_timeout,
            shutdown_grace,
            fail_on_error,
        })
    }

    pub fn modules(&self) -> &[PlannedModule] {
        &self.modules
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configurations
    }

    pub fn installables(&self) -> &[PlannedArtifact] {
        &self.installables
    }

    pub fn framework_properties(&self) -> &BTreeMap<String, String> {
        &self.framework_properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.framework_properties.get(key).map(String::as_str)
    }

    pub fn target_level(&self) -> u32 {
        self.target_level
    }

    pub fn start_timeout(&self) -> Duration {
        self.start_timeout
    }

    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    pub fn fail_on_error(&self) -> bool {
        self.fail_on_error
    }
}

fn parse_property<T: FromStr>(
    properties: &BTreeMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T> {
    match properties.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| Error::InvalidProperty {
            key,
            value: raw.clone(),
        }),
    }
}
