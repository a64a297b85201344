//! Extension dispatch.
//!
//! After merge, every extension on the application is offered to a chain of
//! handlers. A handler that recognizes an extension translates it into launch
//! instructions: extra modules, configurations, installable artifacts, or
//! framework properties. Unhandled optional extensions are logged and
//! dropped; unhandled required extensions abort the launch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use launcher_model::{Application, ArtifactId, Configuration, Extension, Feature, ModuleRef};
use tracing::debug;

use crate::error::{Error, Result};

/// Extension name for init scripts carried as text.
pub const INIT_SCRIPTS_EXTENSION: &str = "init-scripts";

/// Extension name for artifacts handed to the runtime's installer.
pub const BUNDLED_ARTIFACTS_EXTENSION: &str = "bundled-artifacts";

/// Factory pid under which init scripts are registered.
pub const INIT_SCRIPT_FACTORY_PID: &str = "runtime.init.Script";

/// Configuration property holding the script text.
pub const INIT_SCRIPT_PROPERTY: &str = "script";

/// Translates one kind of extension into launch instructions.
pub trait ExtensionHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `Ok(true)` when the handler consumed the extension.
    fn handle(&self, extension: &Extension, context: &mut DispatchContext<'_>) -> Result<bool>;
}

/// What dispatch produced, consumed by the launch planner.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub modules: Vec<ModuleRef>,
    pub configurations: Vec<Configuration>,
    pub installables: Vec<ArtifactId>,
    pub framework_properties: Vec<(String, String)>,
}

impl DispatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
            && self.configurations.is_empty()
            && self.installables.is_empty()
            && self.framework_properties.is_empty()
    }
}

/// Handler-facing view of a dispatch run: lookup of the input features by id,
/// and sinks for everything a handler wants launched.
pub struct DispatchContext<'a> {
    features: &'a HashMap<ArtifactId, Feature>,
    outcome: DispatchOutcome,
}

impl<'a> DispatchContext<'a> {
    pub fn new(features: &'a HashMap<ArtifactId, Feature>) -> Self {
        Self {
            features,
            outcome: DispatchOutcome::default(),
        }
    }

    /// The input feature with this id, if it was part of the merge.
    pub fn feature(&self, id: &ArtifactId) -> Option<&'a Feature> {
        self.features.get(id)
    }

    pub fn enqueue_module(&mut self, module: ModuleRef) {
        self.outcome.modules.push(module);
    }

    pub fn enqueue_configuration(&mut self, configuration: Configuration) {
        self.outcome.configurations.push(configuration);
    }

    pub fn enqueue_installable(&mut self, id: ArtifactId) {
        self.outcome.installables.push(id);
    }

    pub fn add_framework_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.outcome
            .framework_properties
            .push((key.into(), value.into()));
    }

    pub fn into_outcome(self) -> DispatchOutcome {
        self.outcome
    }
}

/// Ordered handler chain.
pub struct ExtensionDispatcher {
    handlers: Vec<Box<dyn ExtensionHandler>>,
}

impl ExtensionDispatcher {
    /// An empty chain. Extensions are only checked for the required flag.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// The built-in chain: init scripts and bundled artifacts.
    pub fn with_defaults() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(Box::new(InitScriptHandler::new()));
        dispatcher.register(Box::new(BundledArtifactsHandler));
        dispatcher
    }

    pub fn register(&mut self, handler: Box<dyn ExtensionHandler>) {
        self.handlers.push(handler);
    }

    /// Offers every extension of `application` to the chain, first claimant
    /// wins.
    ///
    /// # Errors
    ///
    /// Fails when a required extension goes unhandled, or when a handler
    /// rejects a payload.
    pub fn dispatch(
        &self,
        application: &Application,
        context: &mut DispatchContext<'_>,
    ) -> Result<()> {
        for extension in &application.extensions {
            let mut handled = false;
            for handler in &self.handlers {
                if handler.handle(extension, context)? {
                    debug!(
                        extension = %extension.name,
                        handler = handler.name(),
                        "Extension dispatched"
                    );
                    handled = true;
                    break;
                }
            }
            if !handled {
                if extension.required {
                    return Err(Error::UnhandledRequiredExtension {
                        name: extension.name.clone(),
                    });
                }
                debug!(extension = %extension.name, "Ignoring unhandled optional extension");
            }
        }
        Ok(())
    }
}

impl Default for ExtensionDispatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Turns the `init-scripts` text extension into a factory configuration the
/// runtime's init subsystem picks up. Entry names count up per dispatcher, so
/// repeated launches of one process stay distinguishable.
pub struct InitScriptHandler {
    next_index: AtomicU32,
}

impl InitScriptHandler {
    pub fn new() -> Self {
        Self {
            next_index: AtomicU32::new(1),
        }
    }
}

impl Default for InitScriptHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionHandler for InitScriptHandler {
    fn name(&self) -> &'static str {
        "init-scripts"
    }

    fn handle(&self, extension: &Extension, context: &mut DispatchContext<'_>) -> Result<bool> {
        if extension.name != INIT_SCRIPTS_EXTENSION {
            return Ok(false);
        }
        let Some(script) = extension.as_text() else {
            return Err(Error::ExtensionPayload {
                name: extension.name.clone(),
                expected: "text",
            });
        };
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let configuration = Configuration::factory(INIT_SCRIPT_FACTORY_PID, &format!("script-{index}"))
            .with_property(INIT_SCRIPT_PROPERTY, script);
        context.enqueue_configuration(configuration);
        Ok(true)
    }
}

/// Queues the `bundled-artifacts` list for the runtime's installer
/// capability.
pub struct BundledArtifactsHandler;

impl ExtensionHandler for BundledArtifactsHandler {
    fn name(&self) -> &'static str {
        "bundled-artifacts"
    }

    fn handle(&self, extension: &Extension, context: &mut DispatchContext<'_>) -> Result<bool> {
        if extension.name != BUNDLED_ARTIFACTS_EXTENSION {
            return Ok(false);
        }
        let Some(artifacts) = extension.as_artifacts() else {
            return Err(Error::ExtensionPayload {
                name: extension.name.clone(),
                expected: "artifacts",
            });
        };
        for id in artifacts {
            context.enqueue_installable(id.clone());
        }
        Ok(true)
    }
}
