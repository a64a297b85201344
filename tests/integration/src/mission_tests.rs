//! Deployment scenario tests
//!
//! Each module below covers one operational storyline, driving raw feature
//! descriptors through the whole pipeline: merge, extension dispatch,
//! planning and an orchestrated launch against a scripted runtime.

use std::collections::HashMap;

use launcher_core::{
    Capability, DispatchContext, DispatchOutcome, ExtensionDispatcher, LaunchPlan, Orchestrator,
    Phase, StopReason, StopResult,
};
use launcher_merge::{ConfigPolicy, MergeContext, OverrideRule};
use launcher_model::{Application, ArtifactId, Feature};
use launcher_test_utils::{artifact, ScriptedRuntime, StubSupplier};

// =============================================================================
// Test Infrastructure
// =============================================================================

const LAUNCH_ID: &str = "ops:deployment:1.0.0";

fn launch_context() -> MergeContext {
    MergeContext::new(artifact(LAUNCH_ID))
}

/// A deployment under test: raw descriptors plus operator inputs, assembled
/// the same way the launcher binary assembles them.
struct Deployment {
    features: Vec<Feature>,
    context: MergeContext,
}

impl Deployment {
    fn new() -> Self {
        Self {
            features: Vec::new(),
            context: launch_context(),
        }
    }

    fn with_feature(mut self, descriptor: &str) -> Self {
        let feature = Feature::parse(descriptor).expect("valid feature descriptor");
        self.features.push(feature);
        self
    }

    /// Replaces the operator inputs for this deployment.
    fn with_context(mut self, context: MergeContext) -> Self {
        self.context = context;
        self
    }

    fn merge(&self) -> launcher_merge::Result<Application> {
        launcher_merge::merge(&self.features, &self.context)
    }

    fn application(&self) -> Application {
        self.merge().expect("features merge")
    }

    fn dispatch(&self, application: &Application) -> launcher_core::Result<DispatchOutcome> {
        let by_id: HashMap<ArtifactId, Feature> = self
            .features
            .iter()
            .map(|feature| (feature.id.clone(), feature.clone()))
            .collect();
        let mut context = DispatchContext::new(&by_id);
        ExtensionDispatcher::with_defaults().dispatch(application, &mut context)?;
        Ok(context.into_outcome())
    }

    /// The full pure pipeline: merge, dispatch, plan.
    fn plan(&self) -> LaunchPlan {
        let application = self.application();
        let dispatched = self.dispatch(&application).expect("extensions dispatch");
        LaunchPlan::build(&application, dispatched, &StubSupplier::new()).expect("plan builds")
    }
}

async fn wait_for_phase(orchestrator: &Orchestrator, phase: Phase) {
    let mut phases = orchestrator.phase_events();
    while *phases.borrow_and_update() != phase {
        if phases.changed().await.is_err() {
            panic!("phase channel closed before {phase}");
        }
    }
}

/// Launches `plan`, delivers `stop` once the deployment is active, and
/// returns what the orchestrator reported.
async fn run_until_active_then(
    orchestrator: &Orchestrator,
    plan: &LaunchPlan,
    runtime: &ScriptedRuntime,
    stop: StopResult,
) -> StopResult {
    let (result, ()) = tokio::join!(orchestrator.run(plan, runtime), async {
        wait_for_phase(orchestrator, Phase::Active).await;
        runtime.push_stop(stop);
    });
    result.expect("launch completes")
}

// =============================================================================
// Assembly: merging descriptors
// =============================================================================

mod assembly {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Module positions follow the descriptor order; a same-version
    /// redeclaration does not duplicate the module.
    #[test]
    fn test_descriptor_order_defines_module_order() {
        let application = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "modules": ["platform:kernel:1.0.0", "platform:logging:1.2.0"]
                }"#,
            )
            .with_feature(
                r#"{
                    "id": "ops:app:1.0.0",
                    "modules": ["platform:logging:1.2.0", "shop:webapp:3.1.0"]
                }"#,
            )
            .application();

        let ids: Vec<String> = application.modules.iter().map(|m| m.id.to_string()).collect();
        assert_eq!(
            ids,
            ["platform:kernel:1.0.0", "platform:logging:1.2.0", "shop:webapp:3.1.0"]
        );
    }

    /// A version clash without an override names both declaring features.
    #[test]
    fn test_version_clash_reports_both_features() {
        let error = Deployment::new()
            .with_feature(r#"{"id": "ops:base:1.0.0", "modules": ["platform:core:1.0.0"]}"#)
            .with_feature(r#"{"id": "ops:app:1.0.0", "modules": ["platform:core:2.0.0"]}"#)
            .merge()
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Module clash for 'platform:core': version 1.0.0 (from ops:base:1.0.0) \
             against 2.0.0 (from ops:app:1.0.0) with no override"
        );
    }

    /// A pin decides a clash even when no feature declares the pinned
    /// version, keeping the first declaration's ordering.
    #[test]
    fn test_pin_override_forces_an_undeclared_version() {
        let context = launch_context().with_artifact_override(
            "platform",
            "core",
            OverrideRule::Pin("1.5.0".to_string()),
        );
        let application = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "modules": [{"id": "platform:core:1.0.0", "start-order": 4}]
                }"#,
            )
            .with_feature(r#"{"id": "ops:app:1.0.0", "modules": ["platform:core:2.0.0"]}"#)
            .with_context(context)
            .application();

        assert_eq!(application.modules.len(), 1);
        assert_eq!(application.modules[0].id.to_string(), "platform:core:1.5.0");
        assert_eq!(application.modules[0].start_order, 4);
    }

    /// The latest rule orders by semver, not by string comparison.
    #[test]
    fn test_latest_override_orders_by_semver() {
        let context =
            launch_context().with_artifact_override("platform", "core", OverrideRule::Latest);
        let application = Deployment::new()
            .with_feature(r#"{"id": "ops:base:1.0.0", "modules": ["platform:core:1.10.0"]}"#)
            .with_feature(r#"{"id": "ops:app:1.0.0", "modules": ["platform:core:1.9.0"]}"#)
            .with_context(context)
            .application();

        assert_eq!(application.modules[0].id.version(), "1.10.0");
    }

    /// Framework properties are first-wins, variables last-wins.
    #[test]
    fn test_properties_first_wins_variables_last_wins() {
        let application = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "framework-properties": {"storage.root": "/srv/base"},
                    "variables": {"region": "eu-west"}
                }"#,
            )
            .with_feature(
                r#"{
                    "id": "ops:app:1.0.0",
                    "framework-properties": {"storage.root": "/srv/app"},
                    "variables": {"region": "us-east"}
                }"#,
            )
            .application();

        assert_eq!(application.framework_properties["storage.root"], "/srv/base");
        assert_eq!(application.variables["region"], "us-east");
    }

    /// The `start-level` metadata hint fills in a missing start order but
    /// never overrides an explicit one.
    #[test]
    fn test_start_level_hints_become_start_orders() {
        let application = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "modules": [
                        {"id": "platform:early:1.0.0", "metadata": {"start-level": "2"}},
                        {"id": "platform:fixed:1.0.0", "start-order": 7, "metadata": {"start-level": "2"}}
                    ]
                }"#,
            )
            .application();

        assert_eq!(application.modules[0].start_order, 2);
        assert_eq!(application.modules[1].start_order, 7);
    }
}

// =============================================================================
// Configuration clashes
// =============================================================================

mod configuration {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE_POOL: &str = r#"{
        "id": "ops:base:1.0.0",
        "configurations": [
            {"pid": "ops.db.Pool", "properties": {"size": 4, "driver": "h2"}}
        ]
    }"#;

    const APP_POOL: &str = r#"{
        "id": "ops:app:1.0.0",
        "configurations": [
            {"pid": "ops.db.Pool", "properties": {"size": 16}}
        ]
    }"#;

    /// Without a policy the later declaration replaces the earlier one
    /// wholesale.
    #[test]
    fn test_last_declaration_wins_by_default() {
        let application = Deployment::new()
            .with_feature(BASE_POOL)
            .with_feature(APP_POOL)
            .application();

        assert_eq!(application.configurations.len(), 1);
        let pool = &application.configurations[0];
        assert_eq!(pool.properties["size"], 16);
        assert!(!pool.properties.contains_key("driver"));
    }

    /// A use-first policy protects the first declaration of a pid.
    #[test]
    fn test_use_first_policy_protects_a_pid() {
        let context = launch_context().with_config_policy("ops.db.Pool", ConfigPolicy::UseFirst);
        let application = Deployment::new()
            .with_feature(BASE_POOL)
            .with_feature(APP_POOL)
            .with_context(context)
            .application();

        let pool = &application.configurations[0];
        assert_eq!(pool.properties["size"], 4);
        assert_eq!(pool.properties["driver"], "h2");
    }

    /// The `*` policy entry covers every pid without an exact entry.
    #[test]
    fn test_wildcard_policy_merges_unlisted_pids() {
        let context = launch_context().with_config_policy(
            launcher_merge::overrides::CONFIG_POLICY_WILDCARD,
            ConfigPolicy::MergeLast,
        );
        let application = Deployment::new()
            .with_feature(BASE_POOL)
            .with_feature(APP_POOL)
            .with_context(context)
            .application();

        let pool = &application.configurations[0];
        assert_eq!(pool.properties["size"], 16);
        assert_eq!(pool.properties["driver"], "h2");
    }

    /// A tilde pid in a descriptor is recognized as a factory entry.
    #[test]
    fn test_factory_entries_keep_their_identity() {
        let application = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "configurations": [
                        {"pid": "ops.logging.Logger~audit", "properties": {"level": "info"}}
                    ]
                }"#,
            )
            .application();

        let logger = &application.configurations[0];
        assert!(logger.is_factory());
        assert_eq!(logger.factory_pid.as_deref(), Some("ops.logging.Logger"));
        assert_eq!(logger.entry_name(), Some("audit"));
    }
}

// =============================================================================
// Extension pipeline
// =============================================================================

mod extensions {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Artifact extensions union across features and land in the installer
    /// queue without duplicates.
    #[test]
    fn test_artifact_lists_union_into_one_installer_batch() {
        let deployment = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "extensions": [
                        {
                            "name": "bundled-artifacts",
                            "kind": "artifacts",
                            "payload": ["ops.content:branding:1.0.0", "ops.content:fonts:2.0.0"]
                        }
                    ]
                }"#,
            )
            .with_feature(
                r#"{
                    "id": "ops:app:1.0.0",
                    "extensions": [
                        {
                            "name": "bundled-artifacts",
                            "kind": "artifacts",
                            "payload": ["ops.content:fonts:2.0.0", "ops.content:reports:1.1.0"]
                        }
                    ]
                }"#,
            );
        let application = deployment.application();
        let dispatched = deployment.dispatch(&application).unwrap();

        let ids: Vec<String> = dispatched.installables.iter().map(ToString::to_string).collect();
        assert_eq!(
            ids,
            [
                "ops.content:branding:1.0.0",
                "ops.content:fonts:2.0.0",
                "ops.content:reports:1.1.0",
            ]
        );
    }

    /// Init scripts concatenate in feature order and register as a single
    /// factory entry.
    #[test]
    fn test_init_scripts_concatenate_in_feature_order() {
        let deployment = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "extensions": [{"name": "init-scripts", "kind": "text", "payload": "create tenant main"}]
                }"#,
            )
            .with_feature(
                r#"{
                    "id": "ops:app:1.0.0",
                    "extensions": [{"name": "init-scripts", "kind": "text", "payload": "enable search"}]
                }"#,
            );
        let application = deployment.application();
        let dispatched = deployment.dispatch(&application).unwrap();

        assert_eq!(dispatched.configurations.len(), 1);
        let script = &dispatched.configurations[0];
        assert_eq!(script.pid, "runtime.init.Script~script-1");
        assert_eq!(script.properties["script"], "create tenant main\nenable search");
    }

    /// JSON payloads deep-merge across descriptors: objects per key, scalars
    /// take the later value.
    #[test]
    fn test_json_payloads_merge_across_descriptors() {
        let application = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "extensions": [
                        {
                            "name": "ui-settings",
                            "kind": "json",
                            "payload": {"theme": {"accent": "blue", "font": "serif"}}
                        }
                    ]
                }"#,
            )
            .with_feature(
                r#"{
                    "id": "ops:app:1.0.0",
                    "extensions": [
                        {
                            "name": "ui-settings",
                            "kind": "json",
                            "payload": {"theme": {"accent": "green"}, "beta": true}
                        }
                    ]
                }"#,
            )
            .application();

        let settings = application.find_extension("ui-settings").unwrap();
        assert_eq!(
            settings.as_json().unwrap(),
            &serde_json::json!({"theme": {"accent": "green", "font": "serif"}, "beta": true})
        );
    }

    /// A required extension nobody claims refuses the whole launch.
    #[test]
    fn test_unhandled_required_extension_refuses_the_launch() {
        let deployment = Deployment::new().with_feature(
            r#"{
                "id": "ops:base:1.0.0",
                "extensions": [
                    {"name": "content-packages", "required": true, "kind": "json", "payload": {}}
                ]
            }"#,
        );

        let error = deployment.dispatch(&deployment.application()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Required extension 'content-packages' was not handled by any registered handler"
        );
    }
}

// =============================================================================
// Launch operations
// =============================================================================

mod launch {
    use super::*;
    use pretty_assertions::assert_eq;

    /// A deployment walks the runtime one level at a time up to the target
    /// declared in its descriptors.
    #[tokio::test]
    async fn test_deployment_reaches_its_target_level() {
        let plan = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "modules": [
                        "platform:kernel:1.0.0",
                        {"id": "shop:webapp:3.1.0", "start-order": 3}
                    ],
                    "framework-properties": {"runtime.target.level": "3"}
                }"#,
            )
            .plan();
        let runtime = ScriptedRuntime::new();
        let orchestrator = Orchestrator::new();

        let stop =
            run_until_active_then(&orchestrator, &plan, &runtime, StopResult::shutdown()).await;

        assert_eq!(stop.reason, StopReason::Shutdown);
        assert_eq!(orchestrator.phase(), Phase::Stopped);
        assert_eq!(runtime.requested_levels(), [1, 2, 3]);
        assert_eq!(runtime.level(), 3);
        assert_eq!(runtime.started(), ["kernel", "webapp"]);
    }

    /// Pinned version, operator variable and forced target level all reach
    /// the running deployment.
    #[tokio::test]
    async fn test_operator_overrides_rewire_a_running_deployment() {
        let context = launch_context()
            .with_artifact_override("platform", "core", OverrideRule::Pin("2.0.0".to_string()))
            .with_variable("db.host", "standby.internal")
            .with_framework_property("runtime.target.level", "2");
        let plan = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "modules": ["platform:core:1.0.0"],
                    "configurations": [
                        {"pid": "ops.db.Pool", "properties": {"url": "jdbc:pg://${db.host}/ops"}}
                    ],
                    "variables": {"db.host": "db.internal"},
                    "framework-properties": {"runtime.target.level": "10"}
                }"#,
            )
            .with_feature(r#"{"id": "ops:app:1.0.0", "modules": ["platform:core:2.0.0"]}"#)
            .with_context(context)
            .plan();
        let runtime = ScriptedRuntime::new().with_capability(Capability::Configuration);
        let orchestrator = Orchestrator::new();

        run_until_active_then(&orchestrator, &plan, &runtime, StopResult::shutdown()).await;

        assert_eq!(runtime.installs()[0].id, "platform:core:2.0.0");
        assert_eq!(
            runtime.applied_configurations()[0].properties["url"],
            "jdbc:pg://standby.internal/ops"
        );
        assert_eq!(runtime.level(), 2);
    }

    /// An update stop replays the whole deployment: fresh queues, fresh
    /// watcher, fresh installs.
    #[tokio::test]
    async fn test_update_stop_replays_the_deployment() {
        let plan = Deployment::new()
            .with_feature(
                r#"{
                    "id": "ops:base:1.0.0",
                    "modules": ["platform:kernel:1.0.0"],
                    "configurations": [{"pid": "ops.db.Pool", "properties": {"size": 4}}],
                    "framework-properties": {"runtime.target.level": "2"}
                }"#,
            )
            .plan();
        let runtime = ScriptedRuntime::new().with_capability(Capability::Configuration);
        let orchestrator = Orchestrator::new();
        // The runtime stops once for an update, then for good.
        runtime.push_stop(StopResult::update());
        runtime.push_stop(StopResult::shutdown());

        let stop = orchestrator.run(&plan, &runtime).await.unwrap();

        assert_eq!(stop.reason, StopReason::Shutdown);
        assert_eq!(stop.exit_code, 0);
        assert_eq!(orchestrator.phase(), Phase::Stopped);
        assert_eq!(runtime.installs().len(), 2);
        assert_eq!(runtime.applied_configurations().len(), 2);
        assert_eq!(runtime.watch_calls(), 2);
    }

    /// An artifact the supplier cannot produce refuses the plan before any
    /// runtime is touched.
    #[test]
    fn test_missing_artifact_refuses_the_deployment() {
        let deployment = Deployment::new().with_feature(
            r#"{
                "id": "ops:base:1.0.0",
                "modules": ["platform:kernel:1.0.0", "shop:webapp:3.1.0"]
            }"#,
        );
        let application = deployment.application();
        let dispatched = deployment.dispatch(&application).unwrap();
        let supplier = StubSupplier::new().failing_for(artifact("shop:webapp:3.1.0"));

        let error = LaunchPlan::build(&application, dispatched, &supplier).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Artifact shop:webapp:3.1.0 unavailable: scripted supply failure"
        );
    }

    /// A descriptor claiming the pid the init-script handler generates is
    /// caught as a duplicate during planning.
    #[test]
    fn test_init_script_pid_collision_is_refused() {
        let deployment = Deployment::new().with_feature(
            r#"{
                "id": "ops:base:1.0.0",
                "configurations": [{"pid": "runtime.init.Script~script-1", "properties": {}}],
                "extensions": [{"name": "init-scripts", "kind": "text", "payload": "noop"}]
            }"#,
        );
        let application = deployment.application();
        let dispatched = deployment.dispatch(&application).unwrap();

        let error = LaunchPlan::build(&application, dispatched, &StubSupplier::new()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Duplicate configuration pid 'runtime.init.Script~script-1' in launch plan"
        );
    }
}
