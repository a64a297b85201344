//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::Parser;

/// Module Launcher - Merge feature descriptors and launch the result
#[derive(Parser, Debug)]
#[command(name = "launcher")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Feature descriptor file, repeatable, merged in order
    #[arg(short = 'f', long = "feature", value_name = "FILE")]
    pub features: Vec<PathBuf>,

    /// Launcher configuration file (TOML)
    ///
    /// Defaults to launcher.toml in the platform config directory when that
    /// file exists. Command-line flags win over file values.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Home directory for runtime state
    #[arg(long, value_name = "DIR", default_value = "launcher")]
    pub home: PathBuf,

    /// Artifact cache directory [default: <home>/cache]
    #[arg(long, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    /// Framework property override (repeatable)
    ///
    /// A bare KEY counts as KEY=true.
    #[arg(short = 'D', long = "framework-property", value_name = "KEY=VALUE")]
    pub framework_properties: Vec<String>,

    /// Variable override (repeatable)
    #[arg(long = "variable", value_name = "KEY=VALUE")]
    pub variables: Vec<String>,

    /// Module clash override: group:name=VERSION|FIRST|LATEST (repeatable)
    #[arg(short = 'C', long = "clash-override", value_name = "SPEC")]
    pub clash_overrides: Vec<String>,

    /// Configuration merge policy: pid=POLICY, * as pid for the default
    ///
    /// Policies: use-first, use-last, merge-first, merge-last.
    #[arg(long = "config-policy", value_name = "PID=POLICY")]
    pub config_policies: Vec<String>,

    /// Target start level to walk the runtime to
    #[arg(long, value_name = "LEVEL")]
    pub target_level: Option<u32>,

    /// Write the merged application as JSON to FILE and exit
    #[arg(long, value_name = "FILE")]
    pub assemble_only: Option<PathBuf>,

    /// Continue without modules that fail to install or start
    #[arg(long)]
    pub skip_failed_modules: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Splits `key=value` at the first `=`; a bare key yields the value "true".
pub fn split_assignment(raw: &str) -> (String, String) {
    match raw.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (raw.to_string(), "true".to_string()),
    }
}
