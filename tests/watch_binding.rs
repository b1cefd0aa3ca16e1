use std::error::Error;
use std::path::Path;
use std::time::Duration;

use tokio::sync::mpsc;

use assetflow::engine::{RuntimeEvent, TriggerReason};
use assetflow::graph::Node;
use assetflow::types::WatchEventKind;
use assetflow::watch::{bind_watch, ChangeEvent, NotifyFileWatcher, WatchOptions};
use assetflow_test_utils::fakes::ManualWatcher;
use assetflow_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn change(kind: WatchEventKind, rel: &str) -> ChangeEvent {
    ChangeEvent {
        kind,
        rel: rel.to_string(),
    }
}

fn options(delay_ms: u64) -> WatchOptions {
    WatchOptions {
        delay_ms,
        ..WatchOptions::default()
    }
}

async fn next_trigger(rx: &mut mpsc::Receiver<RuntimeEvent>) -> (Node, TriggerReason) {
    match with_timeout(rx.recv()).await {
        Some(RuntimeEvent::Triggered { node, reason }) => (node, reason),
        other => panic!("expected a trigger, got {other:?}"),
    }
}

async fn assert_quiet(rx: &mut mpsc::Receiver<RuntimeEvent>, ms: u64) {
    let got = tokio::time::timeout(Duration::from_millis(ms), rx.recv()).await;
    assert!(got.is_err(), "unexpected event: {got:?}");
}

#[tokio::test]
async fn burst_of_changes_triggers_one_run() -> TestResult {
    init_tracing();
    let watcher = ManualWatcher::new();
    let (tx, mut rx) = mpsc::channel(16);

    let _binding = bind_watch(
        &watcher,
        Path::new("."),
        &["scss/**/*.scss".to_string()],
        Node::task("sass"),
        options(50),
        tx,
    )
    .await?;
    assert_eq!(watcher.binding_count(), 1);

    watcher.emit(change(WatchEventKind::Change, "scss/main.scss"));
    watcher.emit(change(WatchEventKind::Change, "scss/_vars.scss"));
    watcher.emit(change(WatchEventKind::Add, "scss/new.scss"));

    let (node, reason) = next_trigger(&mut rx).await;
    assert_eq!(node, Node::task("sass"));
    assert_eq!(reason, TriggerReason::FileWatch { changes: 3 });
    assert_quiet(&mut rx, 150).await;

    // A later change starts a new batch.
    watcher.emit(change(WatchEventKind::Change, "scss/main.scss"));
    let (_, reason) = next_trigger(&mut rx).await;
    assert_eq!(reason, TriggerReason::FileWatch { changes: 1 });
    Ok(())
}

#[tokio::test]
async fn unmatched_paths_and_kinds_are_filtered() -> TestResult {
    init_tracing();
    let watcher = ManualWatcher::new();
    let (tx, mut rx) = mpsc::channel(16);

    let _binding = bind_watch(
        &watcher,
        Path::new("."),
        &["js/**/*.js".to_string(), "!js/vendor/**".to_string()],
        Node::task("js"),
        WatchOptions {
            events: vec![WatchEventKind::Change],
            ..options(30)
        },
        tx,
    )
    .await?;

    watcher.emit(change(WatchEventKind::Change, "scss/main.scss"));
    watcher.emit(change(WatchEventKind::Change, "js/vendor/jquery.js"));
    watcher.emit(change(WatchEventKind::Unlink, "js/app.js"));
    assert_quiet(&mut rx, 120).await;

    watcher.emit(change(WatchEventKind::Change, "js/app.js"));
    let (_, reason) = next_trigger(&mut rx).await;
    assert_eq!(reason, TriggerReason::FileWatch { changes: 1 });
    Ok(())
}

#[tokio::test]
async fn initial_run_unless_ignored() -> TestResult {
    init_tracing();
    let watcher = ManualWatcher::new();
    let (tx, mut rx) = mpsc::channel(16);

    let _eager = bind_watch(
        &watcher,
        Path::new("."),
        &["**/*.html".to_string()],
        Node::task("reload"),
        WatchOptions {
            ignore_initial: false,
            ..options(30)
        },
        tx.clone(),
    )
    .await?;
    let (node, reason) = next_trigger(&mut rx).await;
    assert_eq!(node, Node::task("reload"));
    assert_eq!(reason, TriggerReason::Initial);

    let _lazy = bind_watch(
        &watcher,
        Path::new("."),
        &["**/*.png".to_string()],
        Node::task("images"),
        options(30),
        tx,
    )
    .await?;
    assert_quiet(&mut rx, 100).await;
    Ok(())
}

#[tokio::test]
async fn dropping_the_binding_stops_triggers() -> TestResult {
    init_tracing();
    let watcher = ManualWatcher::new();
    let (tx, mut rx) = mpsc::channel(16);

    let binding = bind_watch(
        &watcher,
        Path::new("."),
        &["*.html".to_string()],
        Node::task("reload"),
        options(20),
        tx,
    )
    .await?;
    drop(binding);

    watcher.emit(change(WatchEventKind::Change, "index.html"));
    let got = with_timeout(rx.recv()).await;
    assert!(got.is_none(), "channel should close once the forwarder stops");
    Ok(())
}

#[tokio::test]
async fn polling_watcher_sees_change_within_one_interval() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("scss"))?;
    let (tx, mut rx) = mpsc::channel(16);

    let _binding = bind_watch(
        &NotifyFileWatcher,
        dir.path(),
        &["scss/**/*.scss".to_string()],
        Node::task("sass"),
        WatchOptions {
            use_polling: true,
            interval_ms: 1000,
            delay_ms: 50,
            ..WatchOptions::default()
        },
        tx,
    )
    .await?;

    // Give the poller a first scan before the change.
    tokio::time::sleep(Duration::from_millis(250)).await;
    std::fs::write(dir.path().join("scss/main.scss"), "a { color: red; }\n")?;
    std::fs::write(dir.path().join("notes.txt"), "ignored")?;

    let written = std::time::Instant::now();
    let (node, reason) = next_trigger(&mut rx).await;
    assert_eq!(node, Node::task("sass"));
    assert!(matches!(reason, TriggerReason::FileWatch { .. }));
    // One poll interval plus the batching delay, with some slack.
    assert!(written.elapsed() < Duration::from_millis(1000 + 50 + 500));

    // The unrelated file does not cause a second batch.
    assert_quiet(&mut rx, 1200).await;
    Ok(())
}
