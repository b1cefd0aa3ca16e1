#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use assetflow::engine::{RunId, RuntimeEvent};
use assetflow::errors::Result;
use assetflow::exec::RunBackend;
use assetflow::graph::{BoxFuture, Node, Settlement};
use assetflow::notifier::{ErrorNotification, Notifier};
use assetflow::tasks::{Task, TaskContext};
use assetflow::watch::{ChangeEvent, FileWatcher, PatternSet, WatchOptions, WatcherHandle};

/// Shared, ordered log of what fake tasks did (`start:a`, `end:a`).
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e == entry)
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }
}

/// What a [`FakeTask`] settles with.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    Success,
    Recovered(&'static str),
    Fatal(&'static str),
}

/// A leaf that sleeps, journals and settles as told.
pub struct FakeTask {
    name: String,
    delay: Duration,
    outcome: FakeOutcome,
    journal: Journal,
}

impl FakeTask {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            outcome: FakeOutcome::Success,
            journal: journal.clone(),
        }
    }

    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn outcome(mut self, outcome: FakeOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn arc(self) -> Arc<dyn Task> {
        Arc::new(self)
    }
}

impl Task for FakeTask {
    fn run<'a>(&'a self, _ctx: &'a TaskContext) -> BoxFuture<'a, Settlement> {
        Box::pin(async move {
            self.journal.push(format!("start:{}", self.name));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.journal.push(format!("end:{}", self.name));
            match self.outcome {
                FakeOutcome::Success => Settlement::Success,
                FakeOutcome::Recovered(msg) => Settlement::recovered("fake", msg),
                FakeOutcome::Fatal(msg) => {
                    Settlement::fatal(self.name.clone(), anyhow::anyhow!(msg))
                }
            }
        })
    }
}

/// Notifier that keeps every record it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    records: Arc<Mutex<Vec<ErrorNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ErrorNotification> {
        self.records.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, record: &ErrorNotification) {
        self.records.lock().unwrap().push(record.clone());
    }
}

/// Watcher driven by hand: tests call [`ManualWatcher::emit`].
///
/// Events are filtered by glob and kind the same way the real watcher does.
#[derive(Default)]
pub struct ManualWatcher {
    bindings: Mutex<Vec<(PatternSet, WatchOptions, mpsc::UnboundedSender<ChangeEvent>)>>,
}

impl ManualWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ChangeEvent) {
        for (patterns, options, tx) in self.bindings.lock().unwrap().iter() {
            if options.events.contains(&event.kind) && patterns.matches(&event.rel) {
                let _ = tx.send(event.clone());
            }
        }
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.lock().unwrap().len()
    }
}

impl FileWatcher for ManualWatcher {
    fn watch(
        &self,
        _root: &Path,
        patterns: &PatternSet,
        options: &WatchOptions,
    ) -> anyhow::Result<(WatcherHandle, mpsc::UnboundedReceiver<ChangeEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.bindings
            .lock()
            .unwrap()
            .push((patterns.clone(), options.clone(), tx));
        Ok((WatcherHandle::detached(), rx))
    }
}

/// Run backend that records started nodes and settles them immediately
/// with a fixed settlement.
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    started: Arc<Mutex<Vec<(RunId, String)>>>,
    settle_with: Settlement,
}

impl FakeBackend {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        started: Arc<Mutex<Vec<(RunId, String)>>>,
        settle_with: Settlement,
    ) -> Self {
        Self {
            runtime_tx,
            started,
            settle_with,
        }
    }
}

impl RunBackend for FakeBackend {
    fn start_run(&mut self, run_id: RunId, node: Node) -> BoxFuture<'_, Result<()>> {
        let tx = self.runtime_tx.clone();
        let started = Arc::clone(&self.started);
        let settlement = self.settle_with.clone();

        Box::pin(async move {
            started.lock().unwrap().push((run_id, node.label()));
            tx.send(RuntimeEvent::RunSettled { run_id, settlement })
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            Ok(())
        })
    }
}
