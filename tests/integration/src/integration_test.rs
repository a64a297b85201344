//! End-to-end integration test for the vertical slice
//!
//! This test exercises the complete flow: feature descriptors -> merge ->
//! extension dispatch -> launch plan -> orchestrated run on a scripted
//! runtime.

use std::collections::HashMap;

use launcher_core::{
    Capability, DispatchContext, DispatchOutcome, ExtensionDispatcher, LaunchPlan, Orchestrator,
    Phase, StopReason, StopResult,
};
use launcher_merge::{merge, MergeContext};
use launcher_model::{Application, ArtifactId, Feature};
use launcher_test_utils::{artifact, ScriptedRuntime, StubSupplier};
use pretty_assertions::assert_eq;

const APPLICATION_ID: &str = "demo:launch:1.0.0";

const WEB_FEATURE: &str = r#"{
    "id": "demo:web:1.0.0",
    "modules": [
        "demo.modules:http-server:1.4.0",
        {"id": "demo.modules:servlet-api:2.0.0", "start-order": 5}
    ],
    "configurations": [
        {"pid": "demo.http.Server", "properties": {"port": "${http.port}", "host": "localhost"}}
    ],
    "framework-properties": {"runtime.target.level": "5"},
    "variables": {"http.port": "8080"},
    "extensions": [
        {"name": "init-scripts", "kind": "text", "payload": "create service-user web"}
    ]
}"#;

const TELEMETRY_FEATURE: &str = r#"{
    "id": "demo:telemetry:1.0.0",
    "modules": [
        {"id": "demo.modules:metrics-agent:0.9.1", "start-order": 5}
    ],
    "framework-properties": {"runtime.target.level": "30"},
    "extensions": [
        {"name": "bundled-artifacts", "kind": "artifacts", "payload": ["demo.content:dashboards:1.2.0"]}
    ]
}"#;

/// Parse the descriptors exactly as the launcher reads them from disk.
fn features() -> Vec<Feature> {
    [WEB_FEATURE, TELEMETRY_FEATURE]
        .into_iter()
        .map(|json| Feature::parse(json).expect("valid feature descriptor"))
        .collect()
}

fn context() -> MergeContext {
    MergeContext::new(artifact(APPLICATION_ID))
}

/// Runs the pure half of the pipeline: merge plus extension dispatch.
fn assemble(features: &[Feature], context: &MergeContext) -> (Application, DispatchOutcome) {
    let application = merge(features, context).expect("features merge");
    let by_id: HashMap<ArtifactId, Feature> = features
        .iter()
        .map(|feature| (feature.id.clone(), feature.clone()))
        .collect();
    let mut dispatch = DispatchContext::new(&by_id);
    ExtensionDispatcher::with_defaults()
        .dispatch(&application, &mut dispatch)
        .expect("extensions dispatch");
    (application, dispatch.into_outcome())
}

async fn wait_for_phase(orchestrator: &Orchestrator, phase: Phase) {
    let mut phases = orchestrator.phase_events();
    while *phases.borrow_and_update() != phase {
        if phases.changed().await.is_err() {
            panic!("phase channel closed before {phase}");
        }
    }
}

#[test]
fn test_descriptors_merge_into_one_application() {
    let application = merge(&features(), &context()).unwrap();

    assert_eq!(application.id.to_string(), APPLICATION_ID);
    let ids: Vec<String> = application.modules.iter().map(|m| m.id.to_string()).collect();
    assert_eq!(
        ids,
        [
            "demo.modules:http-server:1.4.0",
            "demo.modules:servlet-api:2.0.0",
            "demo.modules:metrics-agent:0.9.1",
        ]
    );

    // The first feature wins the target level clash.
    assert_eq!(application.framework_properties["runtime.target.level"], "5");
    // The variable is already applied to the configuration value.
    assert_eq!(application.configurations[0].properties["port"], "8080");
    assert_eq!(application.configurations[0].properties["host"], "localhost");
}

#[test]
fn test_dispatch_translates_extensions() {
    let (_, dispatched) = assemble(&features(), &context());

    assert_eq!(dispatched.configurations.len(), 1);
    let script = &dispatched.configurations[0];
    assert_eq!(script.pid, "runtime.init.Script~script-1");
    assert_eq!(script.factory_pid.as_deref(), Some("runtime.init.Script"));
    assert_eq!(script.properties["script"], "create service-user web");

    let installables: Vec<String> = dispatched.installables.iter().map(ToString::to_string).collect();
    assert_eq!(installables, ["demo.content:dashboards:1.2.0"]);
}

#[test]
fn test_plan_freezes_paths_and_settings() {
    let (application, dispatched) = assemble(&features(), &context());
    let plan = LaunchPlan::build(&application, dispatched, &StubSupplier::new()).unwrap();

    assert_eq!(plan.modules().len(), 3);
    assert!(plan.modules()[0].path.ends_with("http-server-1.4.0.pkg"));
    assert_eq!(plan.configurations().len(), 2);
    assert_eq!(plan.installables().len(), 1);
    assert_eq!(plan.target_level(), 5);
    assert!(!plan.fail_on_error());
}

#[tokio::test]
async fn test_full_vertical_slice() {
    // 1. Parse the descriptors.
    let features = features();

    // 2. Merge them under the launch id.
    let application = merge(&features, &context()).unwrap();

    // 3. Dispatch the extensions.
    let by_id: HashMap<ArtifactId, Feature> = features
        .iter()
        .map(|feature| (feature.id.clone(), feature.clone()))
        .collect();
    let mut dispatch = DispatchContext::new(&by_id);
    ExtensionDispatcher::with_defaults()
        .dispatch(&application, &mut dispatch)
        .unwrap();

    // 4. Freeze the plan.
    let plan =
        LaunchPlan::build(&application, dispatch.into_outcome(), &StubSupplier::new()).unwrap();

    // 5. Launch against a runtime with both capabilities present.
    let runtime = ScriptedRuntime::new()
        .with_capability(Capability::Configuration)
        .with_capability(Capability::Installer);
    let orchestrator = Orchestrator::new();
    let (result, ()) = tokio::join!(orchestrator.run(&plan, &runtime), async {
        wait_for_phase(&orchestrator, Phase::Active).await;
        runtime.push_stop(StopResult::shutdown());
    });

    // 6. Verify the runtime saw the whole deployment.
    let stop = result.unwrap();
    assert_eq!(stop.reason, StopReason::Shutdown);
    assert_eq!(stop.exit_code, 0);
    assert_eq!(orchestrator.phase(), Phase::Stopped);
    assert_eq!(runtime.level(), 5);

    let installed: Vec<(String, u32)> = runtime
        .installs()
        .iter()
        .map(|record| (record.id.clone(), record.level))
        .collect();
    assert_eq!(
        installed,
        [
            // No declared order, so the runtime's default level applies.
            ("demo.modules:http-server:1.4.0".to_string(), 1),
            ("demo.modules:servlet-api:2.0.0".to_string(), 5),
            ("demo.modules:metrics-agent:0.9.1".to_string(), 5),
        ]
    );
    assert_eq!(runtime.started(), ["http-server", "servlet-api", "metrics-agent"]);

    let applied = runtime.applied_configurations();
    assert_eq!(applied.len(), 2);
    assert_eq!(applied[0].pid, "demo.http.Server");
    assert_eq!(applied[0].properties["port"], "8080");
    assert_eq!(applied[1].pid, "runtime.init.Script~script-1");
    assert_eq!(applied[1].properties["script"], "create service-user web");

    assert_eq!(
        runtime.installer_batches(),
        [vec!["demo.content:dashboards:1.2.0".to_string()]]
    );
}

#[tokio::test]
async fn test_operator_overrides_rewire_the_descriptors() {
    let context = context()
        .with_variable("http.port", "9090")
        .with_framework_property("runtime.target.level", "3");
    let (application, dispatched) = assemble(&features(), &context);
    let plan = LaunchPlan::build(&application, dispatched, &StubSupplier::new()).unwrap();
    assert_eq!(plan.target_level(), 3);

    let runtime = ScriptedRuntime::new().with_capability(Capability::Configuration);
    let orchestrator = Orchestrator::new();
    let (result, ()) = tokio::join!(orchestrator.run(&plan, &runtime), async {
        wait_for_phase(&orchestrator, Phase::Active).await;
        runtime.push_stop(StopResult::shutdown());
    });
    result.unwrap();

    assert_eq!(runtime.level(), 3);
    // The operator value reached the runtime, not the feature default.
    assert_eq!(runtime.applied_configurations()[0].properties["port"], "9090");
}
