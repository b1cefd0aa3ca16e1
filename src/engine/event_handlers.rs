// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{error, info, warn};

use crate::engine::core::{CoreRuntime, RunRecord, RunState};
use crate::engine::{RunId, TriggerReason};
use crate::graph::{FatalError, Node, Settlement};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Start running `node` as run `run_id`.
    StartRun { run_id: RunId, node: Node },
    /// A run settled fatally; the process must stop with this error.
    Abort(FatalError),
    /// Every run has settled and the runtime should exit.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Handle a trigger: every trigger becomes a new, independent run, even if
/// a run of the same node is still in flight.
pub fn handle_trigger(core: &mut CoreRuntime, node: Node, reason: TriggerReason) -> CoreStep {
    let run_id = core.next_run_id;
    core.next_run_id += 1;

    let label = node.label();
    let overlapping = core
        .runs
        .values()
        .filter(|r| r.state.is_active() && r.label == label)
        .count();
    if overlapping > 0 {
        info!(run_id, node = %label, overlapping, "starting run while earlier runs are in flight");
    } else {
        info!(run_id, node = %label, ?reason, "run triggered");
    }

    core.runs.insert(
        run_id,
        RunRecord {
            label,
            reason,
            state: RunState::Pending,
        },
    );

    CoreStep {
        commands: vec![CoreCommand::StartRun { run_id, node }],
        keep_running: true,
    }
}

/// Handle a run settlement.
///
/// - A fatal settlement aborts the runtime.
/// - Otherwise, with `exit_when_idle`, the runtime exits once no run is
///   pending or running.
pub fn handle_run_settled(core: &mut CoreRuntime, run_id: RunId, settlement: Settlement) -> CoreStep {
    let Some(record) = core.runs.get_mut(&run_id) else {
        warn!(run_id, "settlement for unknown run ignored");
        return CoreStep {
            commands: Vec::new(),
            keep_running: true,
        };
    };

    if !record.state.is_active() {
        warn!(run_id, state = ?record.state, "duplicate settlement ignored");
        return CoreStep {
            commands: Vec::new(),
            keep_running: true,
        };
    }

    match &settlement {
        Settlement::Success => {
            record.state = RunState::SettledSuccess;
            info!(run_id, node = %record.label, "run finished");
        }
        Settlement::Recovered(notification) => {
            record.state = RunState::SettledRecovered;
            warn!(run_id, node = %record.label, "run finished with error: {}", notification);
        }
        Settlement::Fatal(err) => {
            record.state = RunState::SettledFatal;
            error!(run_id, node = %record.label, "run failed: {}", err);
            return CoreStep {
                commands: vec![CoreCommand::Abort(err.clone())],
                keep_running: false,
            };
        }
    }

    if core.options.exit_when_idle && core.is_idle() {
        return CoreStep {
            commands: vec![CoreCommand::RequestExit],
            keep_running: false,
        };
    }

    CoreStep {
        commands: Vec::new(),
        keep_running: true,
    }
}
