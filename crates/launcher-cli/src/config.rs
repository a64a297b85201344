//! Launcher configuration files.
//!
//! A TOML file carrying the same inputs as the command line: feature files,
//! framework properties, variables and merge overrides. The file is read
//! first and flags are applied on top, so the command line wins on conflict.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CliError, Result};

pub const CONFIG_FILE_NAME: &str = "launcher.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    /// Feature descriptor files, merged before any `--feature` argument.
    pub features: Vec<PathBuf>,
    pub framework_properties: BTreeMap<String, String>,
    pub variables: BTreeMap<String, String>,
    /// Clash overrides keyed by `group:name`.
    pub overrides: BTreeMap<String, String>,
    /// Configuration merge policies keyed by pid, `*` for the default.
    pub config_policies: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| CliError::Config {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        toml::from_str(&raw).map_err(|error| CliError::Config {
            path: path.to_path_buf(),
            message: error.to_string(),
        })
    }

    /// The platform default config location, when that file exists.
    pub fn default_path() -> Option<PathBuf> {
        let path = dirs::config_dir()?.join("launcher").join(CONFIG_FILE_NAME);
        path.is_file().then_some(path)
    }
}
