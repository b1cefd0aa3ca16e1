// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod notifier;
pub mod server;
pub mod tasks;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason};
use crate::errors::{AssetflowError, Result};
use crate::exec::GraphBackend;
use crate::fs::RealFileSystem;
use crate::graph::{Node, Registry};
use crate::notifier::DesktopNotifier;
use crate::server::LiveReload;
use crate::tasks::TaskContext;
use crate::watch::NotifyFileWatcher;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the task registry
/// - the runtime and its graph backend
/// - live reload, notifier and file watcher capabilities
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.list {
        print_entries(&cfg);
        return Ok(());
    }

    if !cfg.has_entry(&args.entry) {
        return Err(AssetflowError::UnknownEntry(args.entry));
    }

    let notifier = Arc::new(DesktopNotifier::from_config(cfg.notifier()));
    let registry = Arc::new(Registry::from_config(&cfg, notifier)?);

    if args.dry_run {
        print_dry_run(&registry, &args.entry);
        return Ok(());
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let root = config_root_dir(&config_path);
    info!(root = ?root, entry = %args.entry, "starting");

    let ctx = Arc::new(TaskContext {
        root,
        fs: Arc::new(RealFileSystem),
        registry,
        reload: LiveReload::new(),
        watcher: Arc::new(NotifyFileWatcher),
        events: rt_tx.clone(),
    });

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    rt_tx
        .send(RuntimeEvent::Triggered {
            node: Node::task(args.entry.clone()),
            reason: TriggerReason::Manual,
        })
        .await
        .map_err(|e| AssetflowError::Other(anyhow::anyhow!("runtime channel closed: {e}")))?;

    let core = CoreRuntime::new(RuntimeOptions::default());
    let backend = GraphBackend::new(ctx, rt_tx);
    let runtime = Runtime::new(core, rt_rx, backend);
    let core = runtime.run().await?;

    debug!(runs = core.total_runs(), "runtime finished");
    Ok(())
}

/// Figure out the project root.
///
/// - If the config path has a non-empty parent (e.g. "site/Assetflow.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Assetflow.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_entries(cfg: &ConfigFile) {
    println!("tasks ({}):", cfg.tasks().len());
    for (name, task) in cfg.tasks() {
        let bridged = if task.notify { " (notify)" } else { "" };
        println!("  - {name}: {}{bridged}", task.kind.label());
    }
    println!("graphs ({}):", cfg.graphs().len());
    for (name, spec) in cfg.graphs() {
        println!("  - {name}: {}", Node::from(spec).label());
    }
}

/// Dry-run output: the entry expanded down to leaf tasks.
fn print_dry_run(registry: &Registry, entry: &str) {
    println!("assetflow dry-run: {entry}");
    print!("{}", registry.expand(entry).render_tree());
    debug!("dry-run complete (no execution)");
}
