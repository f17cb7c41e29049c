// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{FailurePolicy, SchedulingOrder};

/// Configuration exactly as deserialized from TOML, before validation.
///
/// ```toml
/// [config]
/// failure_policy = "continue"
/// max_workers = 4
///
/// [task.compile]
/// cmd = "cc -c main.c"
/// after = ["generate"]
/// inputs = ["main.c"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,

    /// Iteration order of this map is each node's ordering key.
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { config, task }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Upper bound on concurrently executing nodes.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default)]
    pub scheduling_order: SchedulingOrder,
}

pub(crate) fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::default(),
            max_workers: default_max_workers(),
            scheduling_order: SchedulingOrder::default(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command to execute.
    pub cmd: String,

    /// This task waits for every task listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Declared input files, checked before the command runs.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Whether the task's outputs are meant to be cached. Turns on
    /// cacheability checks for its inputs.
    #[serde(default)]
    pub cacheable: bool,
}

impl TaskConfig {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            after: Vec::new(),
            inputs: Vec::new(),
            cacheable: false,
        }
    }
}
