// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path, load_and_validate};
use crate::dag::{ExecutionPlan, Scheduler};
use crate::exec::{DeclaredInputsValidator, WorkerPool};

/// High-level entry point used by `main.rs`.
///
/// Loads the config, builds the plan (reporting cycles), then runs it on a
/// worker pool until every node is terminal. Ctrl-C cancels the run: nodes
/// already executing finish, nothing new starts.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut cfg = load_and_validate(&config_path)?;
    apply_overrides(&mut cfg, &args);

    let plan = ExecutionPlan::from_config(&cfg)?;
    info!(
        path = %config_path.display(),
        nodes = plan.len(),
        policy = ?cfg.config.failure_policy,
        max_workers = cfg.config.max_workers,
        "execution plan built"
    );

    if args.dry_run {
        print_dry_run(&cfg, &plan);
        return Ok(());
    }

    let scheduler = Arc::new(Scheduler::new(
        plan,
        cfg.config.failure_policy,
        cfg.config.scheduling_order,
    ));

    // Ctrl-C -> stop issuing work.
    {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; cancelling run");
            scheduler.cancel();
        });
    }

    let pool = WorkerPool::new(cfg.config.max_workers)
        .with_validator(Arc::new(DeclaredInputsValidator));
    let summary = pool.run(Arc::clone(&scheduler)).await?;

    println!("{summary}");

    if let Some(reason) = scheduler.halt_reason() {
        debug!(?reason, "run halted");
    }
    if !summary.is_success() {
        let failed: Vec<&str> = summary.failures().collect();
        if failed.is_empty() {
            bail!("run did not complete ({} skipped)", summary.skipped());
        }
        bail!("{} task(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

/// CLI flags take precedence over `[config]`.
fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) {
    if let Some(jobs) = args.jobs {
        cfg.config.max_workers = jobs as usize;
    }
    if let Some(policy) = args.failure_policy() {
        cfg.config.failure_policy = policy;
    }
    if let Some(order) = args.scheduling_order {
        cfg.config.scheduling_order = order;
    }
}

/// Print nodes in a valid execution order with their dependencies and
/// commands.
fn print_dry_run(cfg: &ConfigFile, plan: &ExecutionPlan) {
    println!("execplan dry-run");
    println!("  config.failure_policy = {:?}", cfg.config.failure_policy);
    println!("  config.max_workers = {}", cfg.config.max_workers);
    println!("  config.scheduling_order = {:?}", cfg.config.scheduling_order);
    println!();

    let order = plan
        .graph()
        .topological_order()
        .unwrap_or_else(|| plan.nodes().iter().map(|n| n.id()).collect());

    println!("tasks ({}):", plan.len());
    for id in order {
        let Some(node) = plan.node(id) else { continue };
        println!("  - {}", node.name());
        if let Some(task) = cfg.task.get(node.name()) {
            println!("      cmd: {}", task.cmd);
        }
        let deps: Vec<String> = node
            .dependencies()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
        if !node.inputs().is_empty() {
            println!("      inputs: {:?}", node.inputs());
        }
        if node.is_cacheable() {
            println!("      cacheable: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
