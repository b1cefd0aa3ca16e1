// src/exec/backend.rs

//! Pluggable run backend abstraction.
//!
//! The runtime talks to a `RunBackend` instead of executing graphs itself.
//! This makes it easy to swap in a fake backend in tests that checks the
//! runtime's bookkeeping without running real tasks.
//!
//! - `GraphBackend` is the default implementation used by `assetflow`. It
//!   spawns [`execute`] for every started run and reports the settlement
//!   back to the runtime.
//! - Tests can provide their own `RunBackend` that, for example, records
//!   which nodes were started and directly emits `RunSettled` events.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::{RunId, RuntimeEvent};
use crate::errors::Result;
use crate::graph::{execute, BoxFuture, Node};
use crate::tasks::TaskContext;

/// Trait abstracting how started runs are executed.
pub trait RunBackend: Send {
    /// Start running `node` for `run_id`; the settlement must eventually be
    /// reported as `RuntimeEvent::RunSettled`.
    fn start_run(&mut self, run_id: RunId, node: Node) -> BoxFuture<'_, Result<()>>;
}

/// Production backend: every run is an independent tokio task.
pub struct GraphBackend {
    ctx: Arc<TaskContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl GraphBackend {
    pub fn new(ctx: Arc<TaskContext>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { ctx, runtime_tx }
    }
}

impl RunBackend for GraphBackend {
    fn start_run(&mut self, run_id: RunId, node: Node) -> BoxFuture<'_, Result<()>> {
        let ctx = self.ctx.clone();
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            tokio::spawn(async move {
                let settlement = execute(node, ctx).await;
                debug!(run_id, ?settlement, "run settled");
                if tx
                    .send(RuntimeEvent::RunSettled { run_id, settlement })
                    .await
                    .is_err()
                {
                    debug!(run_id, "runtime gone before run settled");
                }
            });
            Ok(())
        })
    }
}
