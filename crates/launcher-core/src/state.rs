//! Mutable launch state.
//!
//! One [`SharedState`] is shared between the orchestrator and its capability
//! watchers. Pending queues are rebuilt from the plan at the start of every
//! attempt and drained exactly once; the startup hold lives beside the state
//! so watchers can pause level advancement while they push.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex};

use launcher_model::{ArtifactId, Configuration};
use tokio::sync::watch;
use tracing::debug;

use crate::hold::StartupHold;
use crate::plan::{LaunchPlan, PlannedArtifact};
use crate::runtime::ModuleHandle;

/// Lifecycle phases of one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    AwaitingCapabilities,
    Installing,
    Starting,
    Active,
    RestartPending,
    Stopping,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Init => "init",
            Phase::AwaitingCapabilities => "awaiting-capabilities",
            Phase::Installing => "installing",
            Phase::Starting => "starting",
            Phase::Active => "active",
            Phase::RestartPending => "restart-pending",
            Phase::Stopping => "stopping",
            Phase::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// A module recorded at install time, for verification and introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModule {
    pub handle: ModuleHandle,
    pub artifact: ArtifactId,
}

#[derive(Default)]
struct LaunchState {
    pending_configurations: Vec<Configuration>,
    pending_installables: Vec<PlannedArtifact>,
    installed: Vec<InstalledModule>,
}

struct StateInner {
    state: Mutex<LaunchState>,
    // Kept out of the mutex so other tasks can await transitions.
    phase: watch::Sender<Phase>,
    hold: StartupHold,
}

/// Cloneable handle to the state of one orchestrator.
#[derive(Clone)]
pub(crate) struct SharedState {
    inner: Arc<StateInner>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        let (phase, _) = watch::channel(Phase::default());
        Self {
            inner: Arc::new(StateInner {
                state: Mutex::new(LaunchState::default()),
                phase,
                hold: StartupHold::new(),
            }),
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, LaunchState> {
        self.inner.state.lock().expect("launch state lock poisoned")
    }

    pub(crate) fn hold(&self) -> &StartupHold {
        &self.inner.hold
    }

    pub(crate) fn phase(&self) -> Phase {
        *self.inner.phase.borrow()
    }

    pub(crate) fn phase_events(&self) -> watch::Receiver<Phase> {
        self.inner.phase.subscribe()
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.inner.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            debug!(from = %current, to = %phase, "Phase transition");
            *current = phase;
            true
        });
    }

    /// Resets phase and queues for a fresh attempt against `plan`.
    pub(crate) fn begin_attempt(&self, plan: &LaunchPlan) {
        self.set_phase(Phase::Init);
        let mut state = self.locked();
        state.pending_configurations = plan.configurations().to_vec();
        state.pending_installables = plan.installables().to_vec();
        state.installed.clear();
    }

    /// Takes the whole configuration queue; subsequent calls within the same
    /// attempt return nothing.
    pub(crate) fn take_pending_configurations(&self) -> Vec<Configuration> {
        mem::take(&mut self.locked().pending_configurations)
    }

    pub(crate) fn take_pending_installables(&self) -> Vec<PlannedArtifact> {
        mem::take(&mut self.locked().pending_installables)
    }

    pub(crate) fn record_installed(&self, module: InstalledModule) {
        self.locked().installed.push(module);
    }

    pub(crate) fn installed_modules(&self) -> Vec<InstalledModule> {
        self.locked().installed.clone()
    }
}
