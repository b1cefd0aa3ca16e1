// src/engine/mod.rs

//! Orchestration engine for assetflow.
//!
//! This module ties together:
//! - the bookkeeping of every triggered run (`Pending -> Running ->
//!   Settled`)
//! - the main runtime event loop that reacts to:
//!   - the initial entry trigger and file-watch triggers
//!   - run settlements
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::graph::{Node, Settlement};

/// Identifier of a triggered run, unique per process.
pub type RunId = u64;

/// Why a run was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The entry requested on the command line.
    Manual,
    /// A watch binding with `ignore_initial = false` was bound.
    Initial,
    /// A batch of filesystem changes.
    FileWatch { changes: usize },
}

/// Runtime options used by both the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// If true, exit the runtime once every triggered run has settled.
    pub exit_when_idle: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: true,
        }
    }
}

/// Events flowing into the runtime from the CLI, watchers and backends.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A node should be run.
    Triggered { node: Node, reason: TriggerReason },
    /// A run reached its settlement.
    RunSettled { run_id: RunId, settlement: Settlement },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use core::{CoreRuntime, RunState};
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
