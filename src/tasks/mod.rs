// src/tasks/mod.rs

//! Leaf tasks.
//!
//! Every leaf classifies failures of the tool it drives as recovered
//! (malformed input) and failures of the environment as fatal (missing tool,
//! unreadable required file, port in use). Leaves that write output send a
//! live-reload signal after they succeed, never after a failure.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{ServerSection, TaskConfig, TaskKind};
use crate::engine::RuntimeEvent;
use crate::fs::FileSystem;
use crate::graph::{BoxFuture, Node, Registry, Settlement};
use crate::server::LiveReload;
use crate::watch::FileWatcher;

pub mod cache_bust;
pub mod images;
pub mod lint;
pub mod scripts;
pub mod serve;
pub mod styles;
pub mod watch;

pub use cache_bust::{rewrite_cache_bust, run_cache_bust, CacheBustTask};
pub use images::ImagesTask;
pub use lint::LintTask;
pub use scripts::ScriptsTask;
pub use serve::ServeTask;
pub use styles::StylesTask;
pub use watch::WatchTask;

/// A named zero-argument unit of work.
pub trait Task: Send + Sync {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Settlement>;
}

/// Everything a task may touch, shared by all tasks of a process.
pub struct TaskContext {
    /// Project root; every configured path is relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub registry: Arc<Registry>,
    pub reload: LiveReload,
    pub watcher: Arc<dyn FileWatcher>,
    /// Sender into the runtime, used by watch tasks to trigger runs.
    pub events: mpsc::Sender<RuntimeEvent>,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("root", &self.root)
            .field("fs", &self.fs)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    /// Resolve a root-relative path.
    pub fn resolve(&self, rel: impl AsRef<Path>) -> PathBuf {
        let rel = rel.as_ref();
        if rel.as_os_str().is_empty() || rel == Path::new(".") {
            return self.root.clone();
        }
        self.root.join(rel)
    }
}

/// Build the leaf task for a `[task.<name>]` section.
pub fn build_task(cfg: &TaskConfig, server: &ServerSection) -> Arc<dyn Task> {
    match &cfg.kind {
        TaskKind::Styles(c) => Arc::new(StylesTask::new(c.clone())),
        TaskKind::Scripts(c) => Arc::new(ScriptsTask::new(c.clone())),
        TaskKind::CacheBust(c) => Arc::new(CacheBustTask::new(c.clone())),
        TaskKind::Images(c) => Arc::new(ImagesTask::new(c.clone())),
        TaskKind::Lint(c) => Arc::new(LintTask::new(c.clone())),
        TaskKind::Serve => Arc::new(ServeTask::new(server.clone())),
        TaskKind::Watch(c) => Arc::new(WatchTask::new(
            c.paths.clone(),
            Node::from(&c.run),
            c.into(),
        )),
    }
}
