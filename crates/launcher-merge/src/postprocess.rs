//! Post-merge application processors.

use launcher_model::module::START_LEVEL_HINT;
use launcher_model::Application;
use tracing::warn;

/// Runs after a successful merge, before the application reaches the
/// planner. Processors run in chain order, custom ones before built-ins.
pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn post_process(&self, application: &mut Application);
}

pub(crate) fn default_post_processors() -> Vec<Box<dyn PostProcessor>> {
    vec![Box::new(StartLevelHintProcessor)]
}

/// Adopts the `start-level` metadata hint for modules without an explicit
/// start order. A hint that does not parse as a level falls back to 1 so the
/// module still starts early instead of silently at the runtime default.
pub struct StartLevelHintProcessor;

impl PostProcessor for StartLevelHintProcessor {
    fn name(&self) -> &'static str {
        "start-level-hint"
    }

    fn post_process(&self, application: &mut Application) {
        for module in &mut application.modules {
            if !module.has_default_order() {
                continue;
            }
            let Some(hint) = module.metadata.get(START_LEVEL_HINT) else {
                continue;
            };
            match hint.parse::<u32>() {
                Ok(level) => module.start_order = level,
                Err(_) => {
                    warn!(module = %module.id, hint = %hint, "Unparseable start-level hint, using 1");
                    module.start_order = 1;
                }
            }
        }
    }
}
