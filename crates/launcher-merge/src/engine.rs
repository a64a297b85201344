//! The feature merge.

use std::collections::{BTreeMap, HashMap};

use launcher_model::{variables, Application, ArtifactId, Configuration, Extension, Feature, ModuleRef};
use tracing::{debug, trace};

use crate::context::MergeContext;
use crate::error::{Error, Result};
use crate::overrides::{latest_version, ConfigPolicy, OverrideRule};

/// Merges `features` into a single application, in input order.
///
/// Input order is authoritative: a module keeps the position of its first
/// declaration, framework properties are first-wins, variables are
/// last-wins, and configuration clashes follow the policy for their pid
/// (last-wins by default). Same-named extensions are combined by the first
/// claiming handler in the context's chain. After merging, every string
/// value in configurations and framework properties is passed through the
/// variable resolver once, using the merged variables with operator
/// overrides applied on top.
///
/// # Errors
///
/// Fails when two features declare different versions of a module base with
/// no override rule, or when the launch id collides with an input feature id.
pub fn merge(features: &[Feature], context: &MergeContext) -> Result<Application> {
    for feature in features {
        if feature.id == *context.application_id() {
            return Err(Error::ApplicationIdCollision {
                id: feature.id.clone(),
            });
        }
    }

    let mut modules: Vec<ModuleSlot> = Vec::new();
    let mut module_index: HashMap<(String, String), usize> = HashMap::new();
    let mut configurations: Vec<Configuration> = Vec::new();
    let mut config_index: HashMap<String, usize> = HashMap::new();
    // Operator properties are seeded first, so under first-wins they beat
    // every feature declaration.
    let mut framework_properties = context.framework_overrides().clone();
    let mut merged_variables: BTreeMap<String, String> = BTreeMap::new();
    let mut extensions: Vec<Extension> = Vec::new();

    for feature in features {
        debug!(feature = %feature.id, "Merging feature");
        merge_modules(&mut modules, &mut module_index, feature, context)?;
        merge_configurations(&mut configurations, &mut config_index, feature, context);
        for (key, value) in &feature.framework_properties {
            framework_properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        for (key, value) in &feature.variables {
            merged_variables.insert(key.clone(), value.clone());
        }
        merge_extensions(&mut extensions, feature, context);
    }

    for (key, value) in context.variable_overrides() {
        merged_variables.insert(key.clone(), value.clone());
    }

    let lookup = |name: &str| merged_variables.get(name).cloned();
    for value in framework_properties.values_mut() {
        *value = variables::resolve(value, &lookup);
    }
    for configuration in &mut configurations {
        for value in configuration.properties.values_mut() {
            *value = variables::resolve_json(value, &lookup);
        }
    }

    let mut application = Application::new(context.application_id().clone());
    application.modules = modules.into_iter().map(|slot| slot.module).collect();
    application.configurations = configurations;
    application.framework_properties = framework_properties;
    application.variables = merged_variables;
    application.extensions = extensions;

    for processor in context.post_processors() {
        trace!(processor = processor.name(), "Running post processor");
        processor.post_process(&mut application);
    }

    Ok(application)
}

struct ModuleSlot {
    module: ModuleRef,
    declared_by: ArtifactId,
}

fn merge_modules(
    slots: &mut Vec<ModuleSlot>,
    index: &mut HashMap<(String, String), usize>,
    feature: &Feature,
    context: &MergeContext,
) -> Result<()> {
    for module in &feature.modules {
        let key = (module.id.group().to_string(), module.id.name().to_string());
        match index.get(&key) {
            None => {
                index.insert(key, slots.len());
                slots.push(ModuleSlot {
                    module: module.clone(),
                    declared_by: feature.id.clone(),
                });
            }
            Some(&at) => {
                let slot = &mut slots[at];
                if slot.module.id.version() == module.id.version() {
                    // Same version declared again: metadata is last-wins per
                    // key, and a later explicit order replaces the earlier.
                    if !module.has_default_order() {
                        slot.module.start_order = module.start_order;
                    }
                    for (meta_key, meta_value) in &module.metadata {
                        slot.module
                            .metadata
                            .insert(meta_key.clone(), meta_value.clone());
                    }
                    slot.declared_by = feature.id.clone();
                } else {
                    resolve_module_clash(slot, module, feature, context)?;
                }
            }
        }
    }
    Ok(())
}

fn resolve_module_clash(
    slot: &mut ModuleSlot,
    incoming: &ModuleRef,
    feature: &Feature,
    context: &MergeContext,
) -> Result<()> {
    let existing_version = slot.module.id.version().to_string();
    match context.artifact_rule(&incoming.id) {
        None => Err(Error::ModuleVersionConflict {
            group: incoming.id.group().to_string(),
            name: incoming.id.name().to_string(),
            existing: existing_version,
            existing_feature: slot.declared_by.clone(),
            incoming: incoming.id.version().to_string(),
            incoming_feature: feature.id.clone(),
        }),
        Some(OverrideRule::First) => {
            debug!(module = %slot.module.id, "Clash override keeps first declaration");
            Ok(())
        }
        Some(OverrideRule::Latest) => {
            if latest_version(&existing_version, incoming.id.version()) == incoming.id.version() {
                debug!(module = %incoming.id, "Clash override takes later version");
                slot.module = incoming.clone();
                slot.declared_by = feature.id.clone();
            }
            Ok(())
        }
        Some(OverrideRule::Pin(version)) => {
            if incoming.id.version() == version {
                slot.module = incoming.clone();
                slot.declared_by = feature.id.clone();
            } else if slot.module.id.version() != version {
                // Neither declaration carries the pinned version; the pin
                // still decides, keeping the first declaration's ordering
                // and metadata.
                debug!(module = %slot.module.id, pinned = %version, "Pin forces undeclared version");
                slot.module.id = slot.module.id.with_version(version.clone());
            }
            Ok(())
        }
    }
}

fn merge_configurations(
    configurations: &mut Vec<Configuration>,
    index: &mut HashMap<String, usize>,
    feature: &Feature,
    context: &MergeContext,
) {
    for configuration in &feature.configurations {
        match index.get(&configuration.pid) {
            None => {
                index.insert(configuration.pid.clone(), configurations.len());
                configurations.push(configuration.clone());
            }
            Some(&at) => {
                let existing = &mut configurations[at];
                let policy = context.config_policy_for(&configuration.pid);
                trace!(pid = %configuration.pid, ?policy, "Resolving configuration clash");
                match policy {
                    ConfigPolicy::UseFirst => {}
                    ConfigPolicy::UseLast => *existing = configuration.clone(),
                    ConfigPolicy::MergeFirst => {
                        for (key, value) in &configuration.properties {
                            existing
                                .properties
                                .entry(key.clone())
                                .or_insert_with(|| value.clone());
                        }
                    }
                    ConfigPolicy::MergeLast => {
                        for (key, value) in &configuration.properties {
                            existing.properties.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
        }
    }
}

fn merge_extensions(extensions: &mut Vec<Extension>, feature: &Feature, context: &MergeContext) {
    for incoming in &feature.extensions {
        let Some(at) = extensions.iter().position(|e| e.name == incoming.name) else {
            extensions.push(incoming.clone());
            continue;
        };
        let combined = context
            .merge_handlers()
            .find(|handler| handler.claims(incoming))
            .map(|handler| {
                trace!(extension = %incoming.name, handler = handler.name(), "Combining extension");
                handler.combine(&extensions[at], incoming)
            })
            .unwrap_or_else(|| incoming.clone());
        extensions[at] = combined;
    }
}
