// src/watch/watcher.rs

use std::any::Any;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::types::WatchEventKind;
use crate::watch::patterns::PatternSet;

/// Options of a single watch binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Poll the filesystem instead of relying on native notifications.
    pub use_polling: bool,
    pub interval_ms: u64,
    /// Events separated by less than this are coalesced into one batch.
    pub delay_ms: u64,
    pub events: Vec<WatchEventKind>,
    /// When false, the bound node is triggered once at bind time.
    pub ignore_initial: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            use_polling: false,
            interval_ms: 100,
            delay_ms: 200,
            events: WatchEventKind::ALL.to_vec(),
            ignore_initial: true,
        }
    }
}

impl From<&WatchConfig> for WatchOptions {
    fn from(cfg: &WatchConfig) -> Self {
        Self {
            use_polling: cfg.use_polling,
            interval_ms: cfg.interval_ms,
            delay_ms: cfg.delay_ms,
            events: cfg.events.clone(),
            ignore_initial: cfg.ignore_initial,
        }
    }
}

/// A qualifying filesystem change, already filtered by glob and event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: WatchEventKind,
    /// Path relative to the watch root, with forward slashes.
    pub rel: String,
}

/// Keeps the underlying watcher alive. Dropping it stops file watching.
pub struct WatcherHandle {
    _inner: Option<Box<dyn Any + Send>>,
}

impl WatcherHandle {
    pub fn new<W: Any + Send>(inner: W) -> Self {
        Self {
            _inner: Some(Box::new(inner)),
        }
    }

    /// A handle that owns nothing; used by watchers that are driven by hand.
    pub fn detached() -> Self {
        Self { _inner: None }
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Filesystem watching capability.
///
/// Implementations send one [`ChangeEvent`] per changed path that matches
/// `patterns` and whose kind is listed in `options.events`.
pub trait FileWatcher: Send + Sync {
    fn watch(
        &self,
        root: &Path,
        patterns: &PatternSet,
        options: &WatchOptions,
    ) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<ChangeEvent>)>;
}

/// [`FileWatcher`] backed by the `notify` crate.
#[derive(Debug, Clone, Default)]
pub struct NotifyFileWatcher;

impl FileWatcher for NotifyFileWatcher {
    fn watch(
        &self,
        root: &Path,
        patterns: &PatternSet,
        options: &WatchOptions,
    ) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<ChangeEvent>)> {
        // Canonicalize once so we have a stable base path.
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let (tx, rx) = mpsc::unbounded_channel::<ChangeEvent>();

        let handler = {
            let root = root.clone();
            let patterns = patterns.clone();
            let wanted = options.events.clone();
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for (kind, path) in classify(&event) {
                        if !wanted.contains(&kind) {
                            continue;
                        }
                        let Some(rel) = relative_str(&root, &path) else {
                            continue;
                        };
                        if !patterns.matches(&rel) {
                            continue;
                        }
                        debug!(%kind, path = %rel, "watch event");
                        if tx.send(ChangeEvent { kind, rel }).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "file watch error");
                }
            }
        };

        let dirs = watch_dirs(&root, patterns);

        let handle = if options.use_polling {
            let config =
                Config::default().with_poll_interval(Duration::from_millis(options.interval_ms));
            let mut watcher = PollWatcher::new(handler, config)?;
            for dir in &dirs {
                watcher.watch(dir, RecursiveMode::Recursive)?;
            }
            info!(dirs = ?dirs, interval_ms = options.interval_ms, "polling watcher started");
            WatcherHandle::new(watcher)
        } else {
            let mut watcher = RecommendedWatcher::new(handler, Config::default())?;
            for dir in &dirs {
                watcher.watch(dir, RecursiveMode::Recursive)?;
            }
            info!(dirs = ?dirs, "file watcher started");
            WatcherHandle::new(watcher)
        };

        Ok((handle, rx))
    }
}

/// Directories to watch for a pattern set: the collapsed static bases, each
/// replaced by its nearest existing ancestor inside `root`.
fn watch_dirs(root: &Path, patterns: &PatternSet) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for base in patterns.watch_bases() {
        let mut dir = root.join(&base);
        while !dir.is_dir() && dir != root {
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }
        if !dir.is_dir() {
            warn!(base = %base, "watch base does not exist; skipping");
            continue;
        }
        if !dirs.iter().any(|d| dir.starts_with(d)) {
            dirs.retain(|d| !d.starts_with(&dir));
            dirs.push(dir);
        }
    }
    dirs
}

/// Map a notify event onto add / change / unlink per path.
fn classify(event: &Event) -> Vec<(WatchEventKind, PathBuf)> {
    let single = |kind: WatchEventKind| {
        event
            .paths
            .iter()
            .map(|p| (kind, p.clone()))
            .collect::<Vec<_>>()
    };

    match &event.kind {
        EventKind::Create(_) => single(WatchEventKind::Add),
        EventKind::Remove(_) => single(WatchEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => single(WatchEventKind::Unlink),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => single(WatchEventKind::Add),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::new();
            if let Some(from) = event.paths.first() {
                out.push((WatchEventKind::Unlink, from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                out.push((WatchEventKind::Add, to.clone()));
            }
            out
        }
        EventKind::Modify(_) | EventKind::Any => single(WatchEventKind::Change),
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Removed files cannot be canonicalized, so the fallback canonicalizes the
/// parent directory and re-attaches the file name.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let canonical = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;
    let root = root.canonicalize().ok()?;
    let rel = canonical.strip_prefix(&root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
