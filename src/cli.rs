// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::{FailurePolicy, SchedulingOrder};

/// Command-line arguments for `execplan`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "execplan",
    version,
    about = "Execute a DAG of build tasks with a bounded worker pool.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Execplan.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Maximum number of tasks executing at once. Overrides
    /// `[config].max_workers`.
    #[arg(short = 'j', long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub jobs: Option<u32>,

    /// Keep running independent tasks after a failure.
    #[arg(long = "continue", conflicts_with = "fail_fast")]
    pub continue_on_failure: bool,

    /// Stop starting new tasks after the first failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// How to pick among tasks that are ready at the same time.
    #[arg(long, value_enum, value_name = "ORDER")]
    pub scheduling_order: Option<SchedulingOrder>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EXECPLAN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse, validate and print the plan, but don't execute any commands.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Failure policy requested on the command line, if any.
    pub fn failure_policy(&self) -> Option<FailurePolicy> {
        if self.continue_on_failure {
            Some(FailurePolicy::Continue)
        } else if self.fail_fast {
            Some(FailurePolicy::FailFast)
        } else {
            None
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
