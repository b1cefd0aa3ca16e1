use std::error::Error;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use tokio::sync::mpsc;

use assetflow::engine::{
    CoreCommand, CoreRuntime, RunState, Runtime, RuntimeEvent, RuntimeOptions, TriggerReason,
};
use assetflow::errors::AssetflowError;
use assetflow::graph::{Node, Settlement};
use assetflow_test_utils::fakes::FakeBackend;
use assetflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn trigger(name: &str) -> RuntimeEvent {
    RuntimeEvent::Triggered {
        node: Node::task(name),
        reason: TriggerReason::Manual,
    }
}

fn started_id(commands: &[CoreCommand]) -> u64 {
    match commands {
        [CoreCommand::StartRun { run_id, .. }] => *run_id,
        other => panic!("expected a single StartRun, got {other:?}"),
    }
}

#[test]
fn run_moves_from_pending_to_settled() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());

    let step = core.step(trigger("build"));
    assert!(step.keep_running);
    let run_id = started_id(&step.commands);
    assert_eq!(core.run_state(run_id), Some(RunState::Pending));

    assert!(core.mark_started(run_id));
    assert!(!core.mark_started(run_id));
    assert_eq!(core.run_state(run_id), Some(RunState::Running));

    let step = core.step(RuntimeEvent::RunSettled {
        run_id,
        settlement: Settlement::Success,
    });
    assert_eq!(core.run_state(run_id), Some(RunState::SettledSuccess));
    assert!(!step.keep_running);
    assert!(matches!(step.commands.as_slice(), [CoreCommand::RequestExit]));
}

#[test]
fn recovered_run_does_not_abort() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());
    let run_id = started_id(&core.step(trigger("sass")).commands);

    let step = core.step(RuntimeEvent::RunSettled {
        run_id,
        settlement: Settlement::recovered("sass", "Undefined variable"),
    });

    assert_eq!(core.run_state(run_id), Some(RunState::SettledRecovered));
    assert!(matches!(step.commands.as_slice(), [CoreCommand::RequestExit]));
}

#[test]
fn fatal_settlement_aborts() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());
    let run_id = started_id(&core.step(trigger("serve")).commands);

    let step = core.step(RuntimeEvent::RunSettled {
        run_id,
        settlement: Settlement::fatal("serve", anyhow!("address in use")),
    });

    assert!(!step.keep_running);
    match step.commands.as_slice() {
        [CoreCommand::Abort(err)] => assert_eq!(err.node(), "serve"),
        other => panic!("expected Abort, got {other:?}"),
    }
}

#[test]
fn overlapping_triggers_are_independent_runs() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());
    let first = started_id(&core.step(trigger("sass")).commands);
    let second = started_id(&core.step(trigger("sass")).commands);
    assert_ne!(first, second);
    assert_eq!(core.total_runs(), 2);

    let step = core.step(RuntimeEvent::RunSettled {
        run_id: first,
        settlement: Settlement::Success,
    });
    assert!(step.keep_running, "second run is still active");
    assert!(!core.is_idle());
}

#[test]
fn duplicate_and_unknown_settlements_are_ignored() {
    let mut core = CoreRuntime::new(RuntimeOptions {
        exit_when_idle: false,
    });
    let run_id = started_id(&core.step(trigger("js")).commands);

    core.step(RuntimeEvent::RunSettled {
        run_id,
        settlement: Settlement::Success,
    });
    let dup = core.step(RuntimeEvent::RunSettled {
        run_id,
        settlement: Settlement::fatal("js", anyhow!("late")),
    });
    assert!(dup.keep_running);
    assert!(dup.commands.is_empty());
    assert_eq!(core.run_state(run_id), Some(RunState::SettledSuccess));

    let unknown = core.step(RuntimeEvent::RunSettled {
        run_id: 99,
        settlement: Settlement::Success,
    });
    assert!(unknown.keep_running);
    assert!(unknown.commands.is_empty());
}

#[test]
fn shutdown_stops_the_loop() {
    let mut core = CoreRuntime::new(RuntimeOptions::default());
    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(!step.keep_running);
    assert!(step.commands.is_empty());
}

#[tokio::test]
async fn runtime_exits_once_the_entry_settles() -> TestResult {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let started = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend::new(tx.clone(), started.clone(), Settlement::Success);

    tx.send(trigger("default")).await?;
    let core = with_timeout(Runtime::new(CoreRuntime::new(RuntimeOptions::default()), rx, backend).run())
        .await?;

    assert_eq!(core.total_runs(), 1);
    assert_eq!(core.run_state(1), Some(RunState::SettledSuccess));
    assert_eq!(core.run(1).map(|r| r.reason), Some(TriggerReason::Manual));
    assert_eq!(started.lock().unwrap().as_slice(), &[(1, "default".to_string())]);
    Ok(())
}

#[tokio::test]
async fn runtime_returns_fatal_error() -> TestResult {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let started = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeBackend::new(
        tx.clone(),
        started,
        Settlement::fatal("cacheBust", anyhow!("index.html not found")),
    );

    tx.send(trigger("cacheBust")).await?;
    let result =
        with_timeout(Runtime::new(CoreRuntime::new(RuntimeOptions::default()), rx, backend).run())
            .await;

    match result {
        Err(AssetflowError::Fatal(err)) => {
            assert_eq!(err.node(), "cacheBust");
            assert!(err.to_string().contains("index.html not found"));
        }
        other => panic!("expected fatal error, got {other:?}"),
    }
    Ok(())
}
