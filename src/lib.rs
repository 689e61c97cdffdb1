// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod provider;
pub mod script;
pub mod stack;
pub mod trigger;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::Scheduler;
use crate::engine::{ApplyReport, CoreRuntime, Runtime, RuntimeEvent};
use crate::errors::CloudstepError;
use crate::exec::{ProvisionBackend, SshConnector, StepExecutor};
use crate::fs::RealFileSystem;
use crate::graph::{Credential, NodeKind, ProvisionGraph};
use crate::provider::command::CommandProvider;
use crate::script::ScriptLoader;
use crate::stack::{declare_stack, Stack};
use crate::trigger::store::FileFingerprintStore;
use crate::trigger::TriggerEvaluator;
use crate::types::FingerprintStorage;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading (file + environment)
/// - script loading and stack declaration
/// - scheduler / runtime
/// - provider, ssh executor and fingerprint store
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let mut cfg = load_and_validate(args.settings.as_deref(), args.env_file.as_deref())?;
    apply_cli_overrides(&mut cfg, &args)?;
    debug!(settings = ?cfg.settings, "settings loaded");

    let loader = ScriptLoader::new(Arc::new(RealFileSystem), cfg.stack.scripts_dir.clone())
        .with_policy(cfg.engine.placeholder_policy);
    let stack = declare_stack(&cfg.stack, &cfg.settings, &loader)?;

    if args.dry_run {
        print_dry_run(&cfg, &stack.graph);
        return Ok(());
    }

    check_credentials(&stack.graph)?;

    let report = apply(&cfg, &stack).await?;
    println!("{report}");

    if !report.succeeded() {
        let failed: Vec<_> = report.failures().iter().map(|n| n.id.clone()).collect();
        let reason = if report.interrupted {
            "interrupted".to_string()
        } else {
            format!("failed nodes: {}", failed.join(", "))
        };
        return Err(CloudstepError::ApplyFailed(reason).into());
    }
    Ok(())
}

/// Apply a declared stack with the production provider, ssh executor and
/// fingerprint store. Prints the stack outputs as JSON on success.
pub async fn apply(cfg: &ConfigFile, stack: &Stack) -> Result<ApplyReport> {
    let evaluator = match cfg.engine.fingerprint_storage {
        FingerprintStorage::File => {
            let store = FileFingerprintStore::new(cfg.engine.state_dir.clone());
            info!(path = %store.path().display(), "using persisted fingerprints");
            TriggerEvaluator::new(Box::new(store))
        }
        FingerprintStorage::Memory => TriggerEvaluator::in_memory(),
    };
    let step_ids: Vec<&str> = stack
        .graph
        .nodes()
        .filter(|n| n.is_step())
        .map(|n| n.id.as_str())
        .collect();
    evaluator.prune(&step_ids)?;

    let provider = CommandProvider::from_command_line(&cfg.engine.provider_command)
        .context("invalid [engine].provider_command")?;
    info!(program = provider.program(), "using provider helper");

    let connector = SshConnector::new(cfg.engine.ssh_connect_timeout);
    let executor = StepExecutor::new(Arc::new(connector));

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let backend = ProvisionBackend::new(
        Arc::new(provider),
        executor,
        evaluator,
        cfg.engine.max_parallel,
        rt_tx.clone(),
    );
    let outputs = backend.outputs();

    // Ctrl-C → stop dispatching and report what happened so far.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    let core = CoreRuntime::new(Scheduler::from_graph(&stack.graph));
    let runtime = Runtime::new(core, rt_rx, backend);
    let report = runtime.run().await?;

    if report.succeeded() {
        let store = outputs
            .read()
            .map_err(|_| anyhow::anyhow!("output store lock poisoned"))?;
        let resolved = stack.outputs.resolve(&store)?;
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    }

    Ok(report)
}

fn apply_cli_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> Result<()> {
    if let Some(dir) = &args.scripts_dir {
        cfg.stack.scripts_dir = dir.clone();
    }
    if let Some(n) = args.max_parallel {
        if n == 0 {
            return Err(CloudstepError::ConfigError("--max-parallel must be >= 1".to_string()).into());
        }
        cfg.engine.max_parallel = n;
    }
    Ok(())
}

/// Key files referenced by remote steps must exist before anything is created.
fn check_credentials(graph: &ProvisionGraph) -> Result<()> {
    for node in graph.nodes() {
        if let NodeKind::Step(step) = &node.kind
            && let Credential::KeyFile(path) = &step.target.credential
            && !Path::new(path).is_file()
        {
            return Err(CloudstepError::ConfigError(format!(
                "SSH_PRIVATE_KEY_PATH {} does not exist (needed by step '{}')",
                path.display(),
                step.id
            ))
            .into());
        }
    }
    Ok(())
}

/// Print the validated graph in dependency layers without executing anything.
fn print_dry_run(cfg: &ConfigFile, graph: &ProvisionGraph) {
    println!("cloudstep dry-run");
    println!("  engine.max_parallel = {}", cfg.engine.max_parallel);
    println!("  engine.fingerprint_storage = {:?}", cfg.engine.fingerprint_storage);
    println!("  stack.scripts_dir = {}", cfg.stack.scripts_dir.display());
    println!();

    println!("nodes ({}):", graph.len());
    for (i, layer) in graph.layers().iter().enumerate() {
        println!("  layer {i}:");
        for id in layer {
            let Some(node) = graph.node(id) else {
                continue;
            };
            let detail = match &node.kind {
                NodeKind::Resource(spec) => spec.kind.clone(),
                NodeKind::Lookup(spec) => format!("lookup /{}/", spec.name_pattern),
                NodeKind::Step(step) => format!("{} (timeout {:?})", step.command.describe(), step.timeout),
            };
            println!("    - {id} [{}] {detail}", node.label());
            if !node.deps.is_empty() {
                println!("        after: {:?}", node.deps);
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
