use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use assetflow::fs::mock::MockFileSystem;
use assetflow::graph::{execute, Node, Registry, Settlement};
use assetflow_test_utils::fakes::{FakeOutcome, FakeTask, Journal, ManualWatcher};
use assetflow_test_utils::{init_tracing, test_context, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn registry(tasks: Vec<(&str, FakeTask)>) -> Registry {
    let mut registry = Registry::new();
    for (name, task) in tasks {
        registry.register_task(name, task.arc()).unwrap();
    }
    registry
}

async fn run(registry: Registry, node: Node) -> Settlement {
    let tc = test_context(
        registry,
        Arc::new(MockFileSystem::new()),
        Arc::new(ManualWatcher::new()),
        ".",
    );
    with_timeout(execute(node, tc.ctx.clone())).await
}

#[tokio::test]
async fn sequence_continues_after_recovered_error() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let registry = registry(vec![
        (
            "a",
            FakeTask::new("a", &journal).outcome(FakeOutcome::Recovered("bad input")),
        ),
        ("b", FakeTask::new("b", &journal)),
    ]);

    let settlement = run(registry, Node::sequence([Node::task("a"), Node::task("b")])).await;

    assert!(settlement.is_success());
    assert!(journal.contains("end:b"), "b must run after a recovered error");
    Ok(())
}

#[tokio::test]
async fn sequence_stops_at_fatal_error() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let registry = registry(vec![
        (
            "a",
            FakeTask::new("a", &journal).outcome(FakeOutcome::Fatal("tool missing")),
        ),
        ("b", FakeTask::new("b", &journal)),
    ]);

    let settlement = run(registry, Node::sequence([Node::task("a"), Node::task("b")])).await;

    let fatal = settlement.as_fatal().expect("sequence must settle fatally");
    assert_eq!(fatal.node(), "a");
    assert!(fatal.cause().to_string().contains("tool missing"));
    assert!(!journal.contains("start:b"), "b must not run after a fatal error");
    Ok(())
}

#[tokio::test]
async fn parallel_settles_after_all_children() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let registry = registry(vec![
        ("slow", FakeTask::new("slow", &journal).delay_ms(200)),
        ("fast", FakeTask::new("fast", &journal).delay_ms(10)),
    ]);

    let started = Instant::now();
    let settlement = run(
        registry,
        Node::parallel([Node::task("slow"), Node::task("fast")]),
    )
    .await;

    assert!(settlement.is_success());
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(journal.contains("end:slow"));
    assert!(journal.contains("end:fast"));
    // Both started before either finished.
    assert!(journal.position("start:fast") < journal.position("end:slow"));
    assert!(journal.position("end:fast") < journal.position("end:slow"));
    Ok(())
}

#[tokio::test]
async fn parallel_fatal_does_not_cancel_siblings() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let registry = registry(vec![
        (
            "boom",
            FakeTask::new("boom", &journal).outcome(FakeOutcome::Fatal("port in use")),
        ),
        ("slow", FakeTask::new("slow", &journal).delay_ms(100)),
    ]);

    let settlement = run(
        registry,
        Node::parallel([Node::task("boom"), Node::task("slow")]),
    )
    .await;

    assert!(settlement.is_fatal());
    assert!(journal.contains("end:slow"));
    Ok(())
}

#[tokio::test]
async fn parallel_reports_first_fatal_in_declaration_order() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let registry = registry(vec![
        (
            "late",
            FakeTask::new("late", &journal)
                .delay_ms(80)
                .outcome(FakeOutcome::Fatal("late failure")),
        ),
        (
            "early",
            FakeTask::new("early", &journal).outcome(FakeOutcome::Fatal("early failure")),
        ),
    ]);

    let settlement = run(
        registry,
        Node::parallel([Node::task("late"), Node::task("early")]),
    )
    .await;

    assert_eq!(settlement.as_fatal().map(|f| f.node()), Some("late"));
    Ok(())
}

#[tokio::test]
async fn parallel_with_only_recovered_children_succeeds() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let registry = registry(vec![
        (
            "a",
            FakeTask::new("a", &journal).outcome(FakeOutcome::Recovered("x")),
        ),
        ("b", FakeTask::new("b", &journal)),
    ]);

    let settlement = run(registry, Node::parallel([Node::task("a"), Node::task("b")])).await;
    assert!(settlement.is_success());
    Ok(())
}

#[tokio::test]
async fn nested_graphs_resolve_by_name() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let mut registry = registry(vec![
        ("scss", FakeTask::new("scss", &journal).delay_ms(20)),
        ("js", FakeTask::new("js", &journal)),
        ("cacheBust", FakeTask::new("cacheBust", &journal)),
    ]);
    registry.register_graph(
        "build",
        Node::sequence([
            Node::parallel([Node::task("scss"), Node::task("js")]),
            Node::task("cacheBust"),
        ]),
    )?;

    let settlement = run(registry, Node::task("build")).await;

    assert!(settlement.is_success());
    let bust = journal.position("start:cacheBust").unwrap();
    assert!(journal.position("end:scss").unwrap() < bust);
    assert!(journal.position("end:js").unwrap() < bust);
    Ok(())
}

#[tokio::test]
async fn fatal_error_propagates_unchanged_through_nesting() -> TestResult {
    init_tracing();
    let journal = Journal::new();
    let registry = registry(vec![(
        "inner",
        FakeTask::new("inner", &journal).outcome(FakeOutcome::Fatal("disk full")),
    )]);

    let settlement = run(
        registry,
        Node::sequence([Node::parallel([Node::sequence([Node::task("inner")])])]),
    )
    .await;

    let fatal = settlement.as_fatal().expect("outer must be fatal");
    assert_eq!(fatal.node(), "inner");
    assert!(fatal.cause().to_string().contains("disk full"));
    Ok(())
}

#[tokio::test]
async fn unknown_reference_settles_fatally() -> TestResult {
    init_tracing();
    let settlement = run(Registry::new(), Node::task("missing")).await;
    let fatal = settlement.as_fatal().expect("unknown name must be fatal");
    assert!(fatal.to_string().contains("missing"));
    Ok(())
}

#[test]
fn registry_rejects_duplicate_names() {
    let journal = Journal::new();
    let mut registry = Registry::new();
    registry
        .register_task("a", FakeTask::new("a", &journal).arc())
        .unwrap();
    assert!(registry.register_graph("a", Node::task("a")).is_err());
    assert!(
        registry
            .register_task("a", FakeTask::new("a", &journal).arc())
            .is_err()
    );
}
