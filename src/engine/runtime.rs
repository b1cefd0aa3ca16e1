// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{AssetflowError, Result};
use crate::exec::RunBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Feeds `RuntimeEvent`s into the core and hands started runs to a
/// `RunBackend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics.
pub struct Runtime<B: RunBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
}

impl<B: RunBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: RunBackend> Runtime<B> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, backend: B) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Main event loop.
    ///
    /// Returns `Err(AssetflowError::Fatal)` when a run settles fatally and
    /// the final core state otherwise.
    pub async fn run(mut self) -> Result<CoreRuntime> {
        info!("assetflow runtime started");

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.core)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::StartRun { run_id, node } => {
                debug!(run_id, node = %node.label(), "starting run");
                self.backend.start_run(run_id, node).await?;
                self.core.mark_started(run_id);
            }
            CoreCommand::Abort(err) => {
                return Err(AssetflowError::Fatal(err));
            }
            CoreCommand::RequestExit => {
                info!("all runs settled");
            }
        }
        Ok(())
    }
}
