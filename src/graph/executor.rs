// src/graph/executor.rs

//! Sequence / parallel settlement semantics.

use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tracing::{error, info, warn};

use crate::graph::{BoxFuture, Node, Settlement};
use crate::tasks::TaskContext;

/// Run `node` to settlement.
///
/// - `Task(name)` runs the registered leaf, or the registered graph of that
///   name. Unknown names settle fatally.
/// - `Sequence` runs children one at a time. A recovered child counts as
///   success; a fatal child stops the sequence, which settles with the same
///   fatal error.
/// - `Parallel` spawns every child and waits for all of them. A fatal child
///   does not cancel its siblings; the group settles with the first fatal
///   error in declaration order, if any.
pub fn execute(node: Node, ctx: Arc<TaskContext>) -> BoxFuture<'static, Settlement> {
    Box::pin(async move {
        match node {
            Node::Task(name) => run_named(name, ctx).await,
            Node::Sequence(children) => run_sequence(children, ctx).await,
            Node::Parallel(children) => run_parallel(children, ctx).await,
        }
    })
}

async fn run_named(name: String, ctx: Arc<TaskContext>) -> Settlement {
    if let Some(task) = ctx.registry.task(&name) {
        info!(task = %name, "starting");
        let started = Instant::now();
        let settlement = task.run(&ctx).await;
        let elapsed_ms = started.elapsed().as_millis();

        match &settlement {
            Settlement::Success => {
                info!(task = %name, elapsed_ms, "finished");
            }
            Settlement::Recovered(record) => {
                warn!(
                    task = %name,
                    source = %record.source,
                    elapsed_ms,
                    "finished with error: {}",
                    record.message
                );
            }
            Settlement::Fatal(err) => {
                error!(task = %name, elapsed_ms, "failed: {:#}", err.cause());
            }
        }
        return settlement;
    }

    if let Some(graph) = ctx.registry.graph(&name).cloned() {
        return execute(graph, ctx).await;
    }

    Settlement::fatal(name.clone(), anyhow!("unknown task or graph '{name}'"))
}

async fn run_sequence(children: Vec<Node>, ctx: Arc<TaskContext>) -> Settlement {
    let mut recovered = 0usize;

    for child in children {
        match execute(child, ctx.clone()).await {
            Settlement::Success => {}
            Settlement::Recovered(_) => recovered += 1,
            fatal @ Settlement::Fatal(_) => return fatal,
        }
    }

    if recovered > 0 {
        info!(recovered, "series settled with recovered errors");
    }
    Settlement::Success
}

async fn run_parallel(children: Vec<Node>, ctx: Arc<TaskContext>) -> Settlement {
    let handles: Vec<_> = children
        .into_iter()
        .map(|child| {
            let label = child.label();
            (label, tokio::spawn(execute(child, ctx.clone())))
        })
        .collect();

    let mut first_fatal = None;
    let mut recovered = 0usize;

    // Awaiting in declaration order still waits for every child.
    for (label, handle) in handles {
        let settlement = match handle.await {
            Ok(settlement) => settlement,
            Err(join_err) => Settlement::fatal(label, anyhow!("task panicked: {join_err}")),
        };
        match settlement {
            Settlement::Success => {}
            Settlement::Recovered(_) => recovered += 1,
            Settlement::Fatal(err) => {
                if first_fatal.is_none() {
                    first_fatal = Some(err);
                }
            }
        }
    }

    if let Some(err) = first_fatal {
        return Settlement::Fatal(err);
    }
    if recovered > 0 {
        info!(recovered, "parallel group settled with recovered errors");
    }
    Settlement::Success
}
