//! The launch orchestrator.
//!
//! Drives one plan against one runtime: registers capability watchers for
//! non-empty queues, installs modules grouped by effective start level, then
//! walks the runtime level by level until the target is reached, pausing
//! while a startup hold is raised. Startup is bounded by the plan's timeout;
//! the wait for a stop after that is unbounded. A stop with the update
//! reason loops back and relaunches with queues rebuilt from the plan.

use std::collections::BTreeMap;
use std::future::Future;

use launcher_model::ArtifactId;
use tokio::sync::watch;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::hold::StartupHold;
use crate::plan::{effective_level, LaunchPlan, PlannedModule};
use crate::runtime::{
    Capability, CapabilityWatcher, InstallMode, ModuleRuntime, ModuleState, RuntimeError,
    StopReason, StopResult, WatchHandle,
};
use crate::state::{InstalledModule, Phase, SharedState};

/// What to do when a module fails to install or start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallFailurePolicy {
    /// Abort the launch.
    #[default]
    Abort,
    /// Log the failure and continue without the module.
    SkipAndLog,
}

enum AttemptOutcome {
    Stopped(StopResult),
    Restart,
}

/// Runs launch plans. One orchestrator drives one launch at a time; its
/// phase and installed modules stay readable from other tasks.
pub struct Orchestrator {
    state: SharedState,
    install_failure: InstallFailurePolicy,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            state: SharedState::new(),
            install_failure: InstallFailurePolicy::default(),
        }
    }

    pub fn with_install_failure_policy(mut self, policy: InstallFailurePolicy) -> Self {
        self.install_failure = policy;
        self
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Phase transitions as a watch stream, for tasks coordinating with a
    /// launch they do not drive.
    pub fn phase_events(&self) -> watch::Receiver<Phase> {
        self.state.phase_events()
    }

    /// Modules recorded during the current attempt, in install order.
    pub fn installed_modules(&self) -> Vec<InstalledModule> {
        self.state.installed_modules()
    }

    /// The hold gating start-level advancement. Watchers raise it while they
    /// push; other callers may too.
    pub fn startup_hold(&self) -> &StartupHold {
        self.state.hold()
    }

    /// Runs `plan` against `runtime` until the runtime stops for good.
    ///
    /// Update-restarts are handled internally: every attempt rebuilds its
    /// queues from the plan, re-registers watchers and reinstalls modules.
    ///
    /// # Errors
    ///
    /// Fails on module install failures (under the abort policy), on startup
    /// timeout, and on modules not active when the plan demands it. A failed
    /// attempt asks the runtime to stop and waits out the shutdown grace
    /// before returning.
    pub async fn run(&self, plan: &LaunchPlan, runtime: &dyn ModuleRuntime) -> Result<StopResult> {
        loop {
            match self.run_attempt(plan, runtime).await? {
                AttemptOutcome::Stopped(stop) => {
                    self.state.set_phase(Phase::Stopped);
                    return Ok(stop);
                }
                AttemptOutcome::Restart => {
                    self.state.set_phase(Phase::RestartPending);
                    info!("Runtime stopped for an update, relaunching");
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        plan: &LaunchPlan,
        runtime: &dyn ModuleRuntime,
    ) -> Result<AttemptOutcome> {
        self.state.begin_attempt(plan);
        let mut watches: Vec<WatchHandle> = Vec::new();
        let result = self.attempt(plan, runtime, &mut watches).await;
        for watch in watches {
            watch.cancel();
        }
        result
    }

    async fn attempt(
        &self,
        plan: &LaunchPlan,
        runtime: &dyn ModuleRuntime,
        watches: &mut Vec<WatchHandle>,
    ) -> Result<AttemptOutcome> {
        if !plan.configurations().is_empty() || !plan.installables().is_empty() {
            self.state.set_phase(Phase::AwaitingCapabilities);
        }
        if !plan.configurations().is_empty() {
            watches.push(self.watch_for_configuration_sink(runtime)?);
        }
        if !plan.installables().is_empty() {
            watches.push(self.watch_for_installer(runtime)?);
        }
        self.install_modules(plan, runtime)?;
        self.start_and_wait(plan, runtime).await
    }

    /// Registers the watcher that pushes queued configurations when the
    /// runtime's configuration capability appears. The queue drains exactly
    /// once per attempt; pushing happens under a startup hold.
    fn watch_for_configuration_sink(&self, runtime: &dyn ModuleRuntime) -> Result<WatchHandle> {
        let state = self.state.clone();
        let watcher = CapabilityWatcher::new("configuration-push", move |rt: &dyn ModuleRuntime| {
            let pending = state.take_pending_configurations();
            if pending.is_empty() {
                return;
            }
            let Some(sink) = rt.configuration_sink() else {
                // Contract violation; drop the batch rather than wedge startup.
                warn!("Configuration capability signaled without a sink");
                return;
            };
            let _hold = state.hold().acquire();
            for configuration in &pending {
                trace!(pid = %configuration.pid, "Applying configuration");
                if let Err(error) = sink.create_or_update(
                    &configuration.pid,
                    configuration.factory_pid.as_deref(),
                    &configuration.properties,
                ) {
                    warn!(pid = %configuration.pid, %error, "Failed to apply configuration");
                }
            }
            debug!(count = pending.len(), "Configurations pushed");
        });
        Ok(runtime.watch_capability(Capability::Configuration, watcher)?)
    }

    /// Registers the watcher that hands queued installables to the runtime's
    /// installer capability, as one batch.
    fn watch_for_installer(&self, runtime: &dyn ModuleRuntime) -> Result<WatchHandle> {
        let state = self.state.clone();
        let watcher = CapabilityWatcher::new("artifact-install", move |rt: &dyn ModuleRuntime| {
            let pending = state.take_pending_installables();
            if pending.is_empty() {
                return;
            }
            let Some(installer) = rt.artifact_installer() else {
                warn!("Installer capability signaled without an installer");
                return;
            };
            let _hold = state.hold().acquire();
            if let Err(error) = installer.install_all(&pending) {
                warn!(count = pending.len(), %error, "Failed to install artifacts");
            } else {
                debug!(count = pending.len(), "Artifacts handed to installer");
            }
        });
        Ok(runtime.watch_capability(Capability::Installer, watcher)?)
    }

    fn install_modules(&self, plan: &LaunchPlan, runtime: &dyn ModuleRuntime) -> Result<()> {
        self.state.set_phase(Phase::Installing);
        let default_level = runtime.default_start_level();
        let mode = if runtime.supports_reference_install() {
            InstallMode::Reference
        } else {
            InstallMode::Copy
        };

        let mut by_level: BTreeMap<u32, Vec<&PlannedModule>> = BTreeMap::new();
        for module in plan.modules() {
            by_level
                .entry(effective_level(module.start_order, default_level))
                .or_default()
                .push(module);
        }

        for (level, modules) in &by_level {
            debug!(level = *level, count = modules.len(), "Installing modules");
            for module in modules {
                match runtime.install(module, *level, mode) {
                    Ok(handle) => {
                        self.state.record_installed(InstalledModule {
                            handle: handle.clone(),
                            artifact: module.id.clone(),
                        });
                        if let Some(host) = &handle.attached_to {
                            debug!(module = %module.id, host, "Module attaches to a host, not started");
                        } else if let Err(error) = runtime.start_module(&handle) {
                            self.module_failure(&module.id, error)?;
                        }
                    }
                    Err(error) => self.module_failure(&module.id, error)?,
                }
            }
        }
        Ok(())
    }

    fn module_failure(&self, id: &ArtifactId, error: RuntimeError) -> Result<()> {
        match self.install_failure {
            InstallFailurePolicy::Abort => Err(Error::ModuleInstall {
                id: id.clone(),
                source: error,
            }),
            InstallFailurePolicy::SkipAndLog => {
                warn!(module = %id, %error, "Skipping module after failure");
                Ok(())
            }
        }
    }

    async fn start_and_wait(
        &self,
        plan: &LaunchPlan,
        runtime: &dyn ModuleRuntime,
    ) -> Result<AttemptOutcome> {
        self.state.set_phase(Phase::Starting);
        runtime.start()?;

        let target = plan.target_level();
        let mut levels = runtime.level_events();
        let stop_wait = runtime.wait_for_stop();
        tokio::pin!(stop_wait);
        let deadline = Instant::now() + plan.start_timeout();

        while runtime.current_level() < target {
            if self.state.hold().is_clear() {
                let next = runtime.current_level() + 1;
                trace!(level = next, "Raising start level");
                runtime.set_level(next)?;
            }
            tokio::select! {
                changed = levels.changed() => {
                    if changed.is_err() {
                        return Err(Error::Runtime(RuntimeError::new(
                            "level event channel closed",
                        )));
                    }
                }
                () = self.state.hold().cleared(), if !self.state.hold().is_clear() => {}
                stop = &mut stop_wait => {
                    info!(reason = ?stop.reason, "Runtime stopped during startup");
                    return Ok(self.settle(stop));
                }
                () = sleep_until(deadline) => {
                    warn!(target, "Runtime did not reach the target level in time");
                    return self
                        .stop_and_fail(plan, runtime, stop_wait, Error::LaunchTimeout {
                            target,
                            timeout: plan.start_timeout(),
                        })
                        .await;
                }
            }
        }

        self.state.set_phase(Phase::Active);
        info!(level = target, "Runtime is active");

        if plan.fail_on_error() {
            if let Err(error) = self.verify_modules_active(runtime) {
                return self.stop_and_fail(plan, runtime, stop_wait, error).await;
            }
        }

        let stop = stop_wait.await;
        info!(reason = ?stop.reason, exit_code = stop.exit_code, "Runtime stopped");
        Ok(self.settle(stop))
    }

    fn settle(&self, stop: StopResult) -> AttemptOutcome {
        if stop.reason == StopReason::Update {
            AttemptOutcome::Restart
        } else {
            self.state.set_phase(Phase::Stopping);
            AttemptOutcome::Stopped(stop)
        }
    }

    /// Asks the runtime to stop, waits out the shutdown grace for the
    /// confirmation, and returns `error`.
    async fn stop_and_fail<F>(
        &self,
        plan: &LaunchPlan,
        runtime: &dyn ModuleRuntime,
        stop_wait: F,
        error: Error,
    ) -> Result<AttemptOutcome>
    where
        F: Future<Output = StopResult>,
    {
        self.state.set_phase(Phase::Stopping);
        if let Err(stop_error) = runtime.stop() {
            warn!(%stop_error, "Stop request failed");
        }
        if timeout(plan.shutdown_grace(), stop_wait).await.is_err() {
            warn!(grace = ?plan.shutdown_grace(), "Runtime did not confirm the stop within the grace period");
        }
        Err(error)
    }

    /// Checks that every installed, non-attached module reports the active
    /// state.
    fn verify_modules_active(&self, runtime: &dyn ModuleRuntime) -> Result<()> {
        let mut failed = Vec::new();
        for module in self.state.installed_modules() {
            if module.handle.is_attached() {
                continue;
            }
            match runtime.module_state(&module.handle) {
                Ok(ModuleState::Active) => {}
                Ok(state) => failed.push(format!("{} ({state})", module.artifact)),
                Err(error) => failed.push(format!("{} (state unavailable: {error})", module.artifact)),
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::ModulesNotActive { modules: failed })
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
