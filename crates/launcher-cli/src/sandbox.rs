//! The built-in sandbox runtime.
//!
//! A real launch needs an embedding that brings its own module host. The
//! sandbox stands in for one: it accepts every install, walks start levels
//! instantly, and logs configurations and installables instead of applying
//! them. Both capabilities exist from the start. The runner shuts the
//! sandbox down once the launch is active, which makes `launcher` usable end
//! to end as a dry run of a feature set.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use launcher_core::{
    ArtifactInstaller, Capability, CapabilityWatcher, ConfigurationSink, InstallMode, ModuleHandle,
    ModuleRuntime, ModuleState, PlannedArtifact, PlannedModule, RuntimeError, StopResult,
    WatchHandle,
};
use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tracing::{debug, info};

/// Counters accumulated for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SandboxSummary {
    pub modules_installed: u32,
    pub modules_started: u32,
    pub configurations_applied: u32,
    pub artifacts_installed: u32,
}

#[derive(Default)]
struct SandboxState {
    states: HashMap<String, ModuleState>,
    summary: SandboxSummary,
}

/// In-process runtime that simulates a module host.
pub struct SandboxRuntime {
    state: Arc<Mutex<SandboxState>>,
    level_tx: watch::Sender<u32>,
    stop_tx: mpsc::UnboundedSender<StopResult>,
    stop_rx: AsyncMutex<mpsc::UnboundedReceiver<StopResult>>,
}

impl SandboxRuntime {
    pub fn new() -> Self {
        let (level_tx, _) = watch::channel(0);
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(Mutex::new(SandboxState::default())),
            level_tx,
            stop_tx,
            stop_rx: AsyncMutex::new(stop_rx),
        }
    }

    fn locked(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().expect("sandbox state lock poisoned")
    }

    /// Initiates an orderly shutdown.
    pub fn shutdown(&self) {
        let _ = self.stop_tx.send(StopResult::shutdown());
    }

    pub fn summary(&self) -> SandboxSummary {
        self.locked().summary
    }
}

impl Default for SandboxRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModuleRuntime for SandboxRuntime {
    fn default_start_level(&self) -> u32 {
        1
    }

    // Nothing is copied anywhere; the cache file itself is the install.
    fn supports_reference_install(&self) -> bool {
        true
    }

    fn install(
        &self,
        module: &PlannedModule,
        start_level: u32,
        _mode: InstallMode,
    ) -> Result<ModuleHandle, RuntimeError> {
        let mut state = self.locked();
        state
            .states
            .insert(module.id.name().to_string(), ModuleState::Installed);
        state.summary.modules_installed += 1;
        debug!(module = %module.id, level = start_level, "Module installed");
        Ok(ModuleHandle::new(module.id.name(), module.id.version()))
    }

    fn start_module(&self, handle: &ModuleHandle) -> Result<(), RuntimeError> {
        let mut state = self.locked();
        state
            .states
            .insert(handle.symbolic_name.clone(), ModuleState::Active);
        state.summary.modules_started += 1;
        debug!(module = %handle.symbolic_name, "Module started");
        Ok(())
    }

    fn module_state(&self, handle: &ModuleHandle) -> Result<ModuleState, RuntimeError> {
        self.locked()
            .states
            .get(&handle.symbolic_name)
            .copied()
            .ok_or_else(|| {
                RuntimeError::new(format!("unknown module '{}'", handle.symbolic_name))
            })
    }

    fn start(&self) -> Result<(), RuntimeError> {
        info!("Sandbox runtime starting");
        self.level_tx.send_replace(0);
        Ok(())
    }

    fn stop(&self) -> Result<(), RuntimeError> {
        self.shutdown();
        Ok(())
    }

    fn set_level(&self, level: u32) -> Result<(), RuntimeError> {
        self.level_tx.send_replace(level);
        debug!(level, "Reached start level");
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
        Some(Arc::new(SandboxSink {
            state: Arc::clone(&self.state),
        }))
    }

    fn artifact_installer(&self) -> Option<Arc<dyn ArtifactInstaller>> {
        Some(Arc::new(SandboxInstaller {
            state: Arc::clone(&self.state),
        }))
    }

    fn watch_capability(
        &self,
        capability: Capability,
        watcher: CapabilityWatcher,
    ) -> Result<WatchHandle, RuntimeError> {
        // Every capability exists from the start, so the watcher fires once
        // right here and never again.
        debug!(%capability, watcher = watcher.name(), "Capability watch registered");
        watcher.notify_appear(self);
        Ok(WatchHandle::new(|| {}))
    }
}

struct SandboxSink {
    state: Arc<Mutex<SandboxState>>,
}

impl ConfigurationSink for SandboxSink {
    fn create_or_update(
        &self,
        pid: &str,
        factory_pid: Option<&str>,
        properties: &BTreeMap<String, Value>,
    ) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().expect("sandbox state lock poisoned");
        state.summary.configurations_applied += 1;
        debug!(
            pid,
            factory = factory_pid.unwrap_or_default(),
            keys = properties.len(),
            "Configuration applied"
        );
        Ok(())
    }
}

struct SandboxInstaller {
    state: Arc<Mutex<SandboxState>>,
}

impl ArtifactInstaller for SandboxInstaller {
    fn install_all(&self, artifacts: &[PlannedArtifact]) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().expect("sandbox state lock poisoned");
        state.summary.artifacts_installed += artifacts.len() as u32;
        for artifact in artifacts {
            debug!(artifact = %artifact.id, "Artifact handed to installer");
        }
        Ok(())
    }
}
