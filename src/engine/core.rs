// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - starting runs on the backend
//! - handling Ctrl+C / shutdown
//!
//! The core is intended to be unit tested without any Tokio, channels,
//! filesystem, or processes.

use std::collections::BTreeMap;

use crate::engine::event_handlers::{handle_run_settled, handle_trigger, CoreStep};
use crate::engine::{RunId, RuntimeEvent, RuntimeOptions, TriggerReason};

/// Lifecycle of one triggered run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    SettledSuccess,
    SettledRecovered,
    SettledFatal,
}

impl RunState {
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Pending | RunState::Running)
    }
}

/// Bookkeeping for one run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub label: String,
    pub reason: TriggerReason,
    pub state: RunState,
}

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    pub(crate) next_run_id: RunId,
    pub(crate) runs: BTreeMap<RunId, RunRecord>,
    pub(crate) options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self {
            next_run_id: 1,
            runs: BTreeMap::new(),
            options,
        }
    }

    /// Whether no run is pending or running.
    pub fn is_idle(&self) -> bool {
        !self.runs.values().any(|r| r.state.is_active())
    }

    pub fn run_state(&self, run_id: RunId) -> Option<RunState> {
        self.runs.get(&run_id).map(|r| r.state)
    }

    pub fn run(&self, run_id: RunId) -> Option<&RunRecord> {
        self.runs.get(&run_id)
    }

    /// Number of runs ever triggered.
    pub fn total_runs(&self) -> usize {
        self.runs.len()
    }

    /// Called by the shell once the backend accepted a run.
    ///
    /// Returns false if the run was not pending (unknown, or already
    /// started).
    pub fn mark_started(&mut self, run_id: RunId) -> bool {
        match self.runs.get_mut(&run_id) {
            Some(record) if record.state == RunState::Pending => {
                record.state = RunState::Running;
                true
            }
            _ => false,
        }
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::Triggered { node, reason } => handle_trigger(self, node, reason),
            RuntimeEvent::RunSettled { run_id, settlement } => {
                handle_run_settled(self, run_id, settlement)
            }
            RuntimeEvent::ShutdownRequested => CoreStep {
                commands: Vec::new(),
                keep_running: false,
            },
        }
    }
}
