//! Ties the pipeline together: configuration, feature loading, merge,
//! dispatch, planning, and the launch itself against the sandbox runtime.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use launcher_core::plan::PROP_TARGET_LEVEL;
use launcher_core::{
    DispatchContext, ExtensionDispatcher, InstallFailurePolicy, LaunchPlan, Orchestrator, Phase,
};
use launcher_merge::{merge, ArtifactOverrides, ConfigPolicy, MergeContext};
use launcher_model::{Application, ArtifactId, Feature};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::cli::{split_assignment, Cli};
use crate::config::ConfigFile;
use crate::error::{CliError, Result};
use crate::sandbox::SandboxRuntime;
use crate::supply::CacheDirSupplier;

/// Identity given to the merged application descriptor.
pub const DEFAULT_APPLICATION_ID: &str = "launcher:application:1.0.0";

/// Framework property and variable carrying the home directory.
pub const PROP_LAUNCHER_HOME: &str = "launcher.home";

/// Framework property and variable carrying the artifact cache directory.
pub const PROP_LAUNCHER_CACHE: &str = "launcher.cache";

/// Runs the launcher end to end and returns the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => match ConfigFile::default_path() {
            Some(path) => ConfigFile::load(&path)?,
            None => ConfigFile::default(),
        },
    };

    let feature_paths: Vec<&PathBuf> = config.features.iter().chain(cli.features.iter()).collect();
    if feature_paths.is_empty() {
        return Err(CliError::user(
            "no feature descriptors given; pass --feature or list them in the configuration file",
        ));
    }

    let mut features = Vec::with_capacity(feature_paths.len());
    for path in feature_paths {
        features.push(load_feature(path)?);
    }

    let context = build_context(&cli, &config)?;
    let application = merge(&features, &context)?;
    info!(
        modules = application.modules.len(),
        configurations = application.configurations.len(),
        "Features merged"
    );

    if let Some(output) = &cli.assemble_only {
        fs::write(output, application.to_json_pretty()?)?;
        println!(
            "{} Application descriptor written to {}",
            "OK".green().bold(),
            output.display().to_string().cyan()
        );
        return Ok(0);
    }

    launch(&cli, &features, &application).await
}

fn load_feature(path: &Path) -> Result<Feature> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::FeatureRead {
        path: path.to_path_buf(),
        source,
    })?;
    let feature = Feature::parse(&raw).map_err(|source| CliError::FeatureParse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), id = %feature.id, "Feature loaded");
    Ok(feature)
}

fn cache_dir(cli: &Cli) -> PathBuf {
    cli.cache.clone().unwrap_or_else(|| cli.home.join("cache"))
}

/// Builds the merge context from the configuration file and the command
/// line. File entries are applied first, so flags win wherever both name the
/// same key.
fn build_context(cli: &Cli, config: &ConfigFile) -> Result<MergeContext> {
    let mut context = MergeContext::new(
        DEFAULT_APPLICATION_ID
            .parse()
            .expect("default application id is well-formed"),
    );

    let override_specs = config
        .overrides
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .chain(cli.clash_overrides.iter().cloned());
    for spec in override_specs {
        let ((group, name), rule) = ArtifactOverrides::parse_entry(&spec)?;
        context = context.with_artifact_override(group, name, rule);
    }

    let policies = config
        .config_policies
        .iter()
        .map(|(pid, raw)| (pid.clone(), raw.clone()))
        .chain(cli.config_policies.iter().map(|raw| split_assignment(raw)));
    for (pid, raw_policy) in policies {
        let policy: ConfigPolicy = raw_policy.parse()?;
        context = context.with_config_policy(pid, policy);
    }

    let mut framework_properties = config.framework_properties.clone();
    for raw in &cli.framework_properties {
        let (key, value) = split_assignment(raw);
        framework_properties.insert(key, value);
    }

    let mut variables = config.variables.clone();
    for raw in &cli.variables {
        let (key, value) = split_assignment(raw);
        variables.insert(key, value);
    }

    // The directories chosen on the command line are authoritative; features
    // can reference them as ${launcher.home} and ${launcher.cache}.
    let home = cli.home.display().to_string();
    let cache = cache_dir(cli).display().to_string();
    framework_properties.insert(PROP_LAUNCHER_HOME.to_string(), home.clone());
    framework_properties.insert(PROP_LAUNCHER_CACHE.to_string(), cache.clone());
    variables.insert(PROP_LAUNCHER_HOME.to_string(), home);
    variables.insert(PROP_LAUNCHER_CACHE.to_string(), cache);
    if let Some(level) = cli.target_level {
        framework_properties.insert(PROP_TARGET_LEVEL.to_string(), level.to_string());
    }

    for (key, value) in framework_properties {
        context = context.with_framework_property(key, value);
    }
    for (key, value) in variables {
        context = context.with_variable(key, value);
    }

    Ok(context)
}

async fn launch(cli: &Cli, features: &[Feature], application: &Application) -> Result<i32> {
    let by_id: HashMap<ArtifactId, Feature> = features
        .iter()
        .map(|feature| (feature.id.clone(), feature.clone()))
        .collect();
    let mut dispatch_context = DispatchContext::new(&by_id);
    ExtensionDispatcher::with_defaults().dispatch(application, &mut dispatch_context)?;
    let dispatched = dispatch_context.into_outcome();

    let cache = cache_dir(cli);
    fs::create_dir_all(&cli.home)?;
    fs::create_dir_all(&cache)?;

    let supplier = CacheDirSupplier::new(&cache);
    let plan = LaunchPlan::build(application, dispatched, &supplier)?;

    let policy = if cli.skip_failed_modules {
        InstallFailurePolicy::SkipAndLog
    } else {
        InstallFailurePolicy::Abort
    };
    let orchestrator = Orchestrator::new().with_install_failure_policy(policy);
    let runtime = SandboxRuntime::new();

    println!(
        "{} Launching {} modules toward level {}",
        "=>".blue().bold(),
        plan.modules().len(),
        plan.target_level()
    );

    let mut phases = orchestrator.phase_events();
    let stop = tokio::select! {
        result = orchestrator.run(&plan, &runtime) => result?,
        () = drive_sandbox(&runtime, &mut phases) => unreachable!("sandbox driver never finishes"),
    };

    let summary = runtime.summary();
    println!(
        "{} Runtime stopped: {} modules installed, {} started, {} configurations, {} artifacts",
        "OK".green().bold(),
        summary.modules_installed,
        summary.modules_started,
        summary.configurations_applied,
        summary.artifacts_installed
    );
    Ok(stop.exit_code)
}

/// Shuts the sandbox down once the launch is active, then parks so the
/// select in [`launch`] always resolves through the orchestrator.
async fn drive_sandbox(runtime: &SandboxRuntime, phases: &mut watch::Receiver<Phase>) {
    loop {
        if *phases.borrow_and_update() == Phase::Active {
            debug!("Launch active; stopping the sandbox");
            runtime.shutdown();
            break;
        }
        if phases.changed().await.is_err() {
            break;
        }
    }
    std::future::pending::<()>().await;
}
