// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a config file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), tasks = config.task.len(), "config file parsed");

    Ok(config)
}

/// Load a configuration file and validate it.
///
/// Checks that there is at least one task, that `max_workers` is positive
/// and that every `after` entry names a declared task. Dependency cycles are
/// reported later, when the plan is built.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// `Execplan.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Execplan.toml")
}
