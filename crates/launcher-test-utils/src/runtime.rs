//! A scriptable runtime double.
//!
//! [`ScriptedRuntime`] implements `ModuleRuntime` entirely in memory and
//! records every call the orchestrator makes: installs with their levels,
//! started modules, applied configurations, installer batches and requested
//! start levels. Tests script failures, capability appearance and stop
//! events up front, then assert on the records afterwards.
//!
//! Levels are walked automatically by default: `set_level` reports the new
//! level right back. [`ScriptedRuntime::halting_levels`] switches that off so
//! a test can hold the runtime below its target and drive progress manually
//! with [`ScriptedRuntime::report_level`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use launcher_core::{
    ArtifactInstaller, Capability, CapabilityWatcher, ConfigurationSink, InstallMode, ModuleHandle,
    ModuleRuntime, ModuleState, PlannedArtifact, PlannedModule, RuntimeError, StopResult,
    WatchHandle,
};
use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};

/// One `install` call as the runtime saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRecord {
    pub id: String,
    pub level: u32,
    pub mode: InstallMode,
    pub path: PathBuf,
}

/// One configuration dictionary as the sink received it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedConfiguration {
    pub pid: String,
    pub factory_pid: Option<String>,
    pub properties: BTreeMap<String, Value>,
}

struct Registration {
    id: u64,
    capability: Capability,
    watcher: Arc<CapabilityWatcher>,
}

#[derive(Default)]
struct Shared {
    default_level: u32,
    supports_reference: bool,
    auto_levels: bool,
    requested_levels: Vec<u32>,
    installs: Vec<InstallRecord>,
    started: Vec<String>,
    states: HashMap<String, ModuleState>,
    scripted_states: HashMap<String, ModuleState>,
    attached: HashMap<String, String>,
    failing_installs: HashSet<String>,
    failing_starts: HashSet<String>,
    failing_pids: HashSet<String>,
    present: HashSet<Capability>,
    watchers: Vec<Registration>,
    watch_calls: usize,
    runtime_started: bool,
    stop_requests: usize,
    applied: Vec<AppliedConfiguration>,
    installer_batches: Vec<Vec<String>>,
}

pub struct ScriptedRuntime {
    shared: Arc<Mutex<Shared>>,
    level_tx: watch::Sender<u32>,
    stop_tx: mpsc::UnboundedSender<StopResult>,
    stop_rx: AsyncMutex<mpsc::UnboundedReceiver<StopResult>>,
    next_watch_id: AtomicU64,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        let (level_tx, _) = watch::channel(0);
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Mutex::new(Shared {
                default_level: 1,
                auto_levels: true,
                ..Shared::default()
            })),
            level_tx,
            stop_tx,
            stop_rx: AsyncMutex::new(stop_rx),
            next_watch_id: AtomicU64::new(0),
        }
    }

    fn locked(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().expect("scripted runtime lock poisoned")
    }

    pub fn with_default_level(self, level: u32) -> Self {
        self.locked().default_level = level;
        self
    }

    pub fn with_reference_install(self) -> Self {
        self.locked().supports_reference = true;
        self
    }

    /// Stops levels from advancing on their own; use
    /// [`report_level`](Self::report_level) to move.
    pub fn halting_levels(self) -> Self {
        self.locked().auto_levels = false;
        self
    }

    /// Marks a capability as present before the launch starts.
    pub fn with_capability(self, capability: Capability) -> Self {
        self.locked().present.insert(capability);
        self
    }

    /// Scripts the install of the module with this canonical id to fail.
    pub fn failing_install(self, id: &str) -> Self {
        self.locked().failing_installs.insert(id.to_string());
        self
    }

    /// Scripts the start of the module with this symbolic name to fail.
    pub fn failing_start(self, symbolic_name: &str) -> Self {
        self.locked().failing_starts.insert(symbolic_name.to_string());
        self
    }

    /// Scripts the configuration sink to reject this pid.
    pub fn failing_configuration(self, pid: &str) -> Self {
        self.locked().failing_pids.insert(pid.to_string());
        self
    }

    /// Modules with this name install as attached to `host`.
    pub fn attached_module(self, symbolic_name: &str, host: &str) -> Self {
        self.locked()
            .attached
            .insert(symbolic_name.to_string(), host.to_string());
        self
    }

    /// Pins the reported state of a module, overriding the recorded one.
    pub fn with_module_state(self, symbolic_name: &str, state: ModuleState) -> Self {
        self.locked()
            .scripted_states
            .insert(symbolic_name.to_string(), state);
        self
    }

    /// Makes a capability appear now, notifying registered watchers.
    pub fn appear(&self, capability: Capability) {
        let to_notify: Vec<Arc<CapabilityWatcher>> = {
            let mut shared = self.locked();
            shared.present.insert(capability);
            shared
                .watchers
                .iter()
                .filter(|registration| registration.capability == capability)
                .map(|registration| Arc::clone(&registration.watcher))
                .collect()
        };
        // Callbacks re-enter the runtime, so the lock must be released.
        for watcher in to_notify {
            watcher.notify_appear(self);
        }
    }

    /// Reports that the runtime reached `level`. Only needed with
    /// [`halting_levels`](Self::halting_levels).
    pub fn report_level(&self, level: u32) {
        self.level_tx.send_replace(level);
    }

    /// Delivers a stop event to whoever waits in `wait_for_stop`.
    pub fn push_stop(&self, stop: StopResult) {
        let _ = self.stop_tx.send(stop);
    }

    pub fn installs(&self) -> Vec<InstallRecord> {
        self.locked().installs.clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.locked().started.clone()
    }

    pub fn watch_calls(&self) -> usize {
        self.locked().watch_calls
    }

    pub fn applied_configurations(&self) -> Vec<AppliedConfiguration> {
        self.locked().applied.clone()
    }

    pub fn installer_batches(&self) -> Vec<Vec<String>> {
        self.locked().installer_batches.clone()
    }

    pub fn requested_levels(&self) -> Vec<u32> {
        self.locked().requested_levels.clone()
    }

    pub fn level(&self) -> u32 {
        *self.level_tx.borrow()
    }

    pub fn stop_requests(&self) -> usize {
        self.locked().stop_requests
    }

    pub fn runtime_started(&self) -> bool {
        self.locked().runtime_started
    }
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleRuntime for ScriptedRuntime {
    fn default_start_level(&self) -> u32 {
        self.locked().default_level
    }

    fn supports_reference_install(&self) -> bool {
        self.locked().supports_reference
    }

    fn install(
        &self,
        module: &PlannedModule,
        start_level: u32,
        mode: InstallMode,
    ) -> Result<ModuleHandle, RuntimeError> {
        let mut shared = self.locked();
        let canonical = module.id.to_string();
        if shared.failing_installs.contains(&canonical) {
            return Err(RuntimeError::new(format!(
                "scripted install failure for {canonical}"
            )));
        }
        shared.installs.push(InstallRecord {
            id: canonical,
            level: start_level,
            mode,
            path: module.path.clone(),
        });
        let name = module.id.name().to_string();
        let handle = match shared.attached.get(&name) {
            Some(host) => ModuleHandle::attached(&name, module.id.version(), host.clone()),
            None => ModuleHandle::new(&name, module.id.version()),
        };
        shared.states.insert(name, ModuleState::Installed);
        Ok(handle)
    }

    fn start_module(&self, handle: &ModuleHandle) -> Result<(), RuntimeError> {
        let mut shared = self.locked();
        if shared.failing_starts.contains(&handle.symbolic_name) {
            return Err(RuntimeError::new(format!(
                "scripted start failure for {}",
                handle.symbolic_name
            )));
        }
        shared.started.push(handle.symbolic_name.clone());
        shared
            .states
            .insert(handle.symbolic_name.clone(), ModuleState::Active);
        Ok(())
    }

    fn module_state(&self, handle: &ModuleHandle) -> Result<ModuleState, RuntimeError> {
        let shared = self.locked();
        if let Some(state) = shared.scripted_states.get(&handle.symbolic_name) {
            return Ok(*state);
        }
        shared
            .states
            .get(&handle.symbolic_name)
            .copied()
            .ok_or_else(|| {
                RuntimeError::new(format!("unknown module '{}'", handle.symbolic_name))
            })
    }

    fn start(&self) -> Result<(), RuntimeError> {
        self.locked().runtime_started = true;
        self.level_tx.send_replace(0);
        Ok(())
    }

    fn stop(&self) -> Result<(), RuntimeError> {
        self.locked().stop_requests += 1;
        // A scripted stop request always confirms promptly.
        let _ = self.stop_tx.send(StopResult::shutdown());
        Ok(())
    }

    fn set_level(&self, level: u32) -> Result<(), RuntimeError> {
        let auto = {
            let mut shared = self.locked();
            shared.requested_levels.push(level);
            shared.auto_levels
        };
        if auto {
            self.level_tx.send_replace(level);
        }
        Ok(())
    }

    fn current_level(&self) -> u32 {
        *self.level_tx.borrow()
    }

    fn level_events(&self) -> watch::Receiver<u32> {
        self.level_tx.subscribe()
    }

    async fn wait_for_stop(&self) -> StopResult {
        self.stop_rx
            .lock()
            .await
            .recv()
            .await
            .unwrap_or_else(StopResult::shutdown)
    }

    fn configuration_sink(&self) -> Option<Arc<dyn ConfigurationSink>> {
        if !self.locked().present.contains(&Capability::Configuration) {
            return None;
        }
        Some(Arc::new(RecordingSink {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn artifact_installer(&self) -> Option<Arc<dyn ArtifactInstaller>> {
        if !self.locked().present.contains(&Capability::Installer) {
            return None;
        }
        Some(Arc::new(RecordingInstaller {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn watch_capability(
        &self,
        capability: Capability,
        watcher: CapabilityWatcher,
    ) -> Result<WatchHandle, RuntimeError> {
        let watcher = Arc::new(watcher);
        let id = self.next_watch_id.fetch_add(1, Ordering::SeqCst);
        let already_present = {
            let mut shared = self.locked();
            shared.watch_calls += 1;
            shared.watchers.push(Registration {
                id,
                capability,
                watcher: Arc::clone(&watcher),
            });
            shared.present.contains(&capability)
        };
        if already_present {
            watcher.notify_appear(self);
        }
        let shared = Arc::clone(&self.shared);
        Ok(WatchHandle::new(move || {
            shared
                .lock()
                .expect("scripted runtime lock poisoned")
                .watchers
                .retain(|registration| registration.id != id);
        }))
    }
}

struct RecordingSink {
    shared: Arc<Mutex<Shared>>,
}

impl ConfigurationSink for RecordingSink {
    fn create_or_update(
        &self,
        pid: &str,
        factory_pid: Option<&str>,
        properties: &BTreeMap<String, Value>,
    ) -> Result<(), RuntimeError> {
        let mut shared = self.shared.lock().expect("scripted runtime lock poisoned");
        if shared.failing_pids.contains(pid) {
            return Err(RuntimeError::new(format!("configuration '{pid}' rejected")));
        }
        shared.applied.push(AppliedConfiguration {
            pid: pid.to_string(),
            factory_pid: factory_pid.map(str::to_string),
            properties: properties.clone(),
        });
        Ok(())
    }
}

struct RecordingInstaller {
    shared: Arc<Mutex<Shared>>,
}

impl ArtifactInstaller for RecordingInstaller {
    fn install_all(&self, artifacts: &[PlannedArtifact]) -> Result<(), RuntimeError> {
        let batch: Vec<String> = artifacts.iter().map(|a| a.id.to_string()).collect();
        self.shared
            .lock()
            .expect("scripted runtime lock poisoned")
            .installer_batches
            .push(batch);
        Ok(())
    }
}
