pub mod builders;
pub mod fakes;

use std::path::PathBuf;
use std::sync::{Arc, Once};

use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

use assetflow::engine::RuntimeEvent;
use assetflow::fs::FileSystem;
use assetflow::graph::Registry;
use assetflow::server::LiveReload;
use assetflow::tasks::TaskContext;
use assetflow::watch::FileWatcher;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// A task context for tests, plus the receiving end of its runtime channel.
pub struct TestContext {
    pub ctx: Arc<TaskContext>,
    pub events: mpsc::Receiver<RuntimeEvent>,
}

/// Build a [`TestContext`] around the given registry, filesystem and
/// watcher, rooted at `root`.
pub fn test_context(
    registry: Registry,
    fs: Arc<dyn FileSystem>,
    watcher: Arc<dyn FileWatcher>,
    root: impl Into<PathBuf>,
) -> TestContext {
    let (tx, rx) = mpsc::channel(64);
    let ctx = Arc::new(TaskContext {
        root: root.into(),
        fs,
        registry: Arc::new(registry),
        reload: LiveReload::new(),
        watcher,
        events: tx,
    });
    TestContext { ctx, events: rx }
}
