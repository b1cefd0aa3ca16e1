// src/tasks/cache_bust.rs

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;
use regex::{NoExpand, Regex};
use tracing::{debug, info};

use crate::config::CacheBustConfig;
use crate::fs::FileSystem;
use crate::graph::{BoxFuture, Settlement};
use crate::tasks::{Task, TaskContext};

/// Rewrites `<marker>=<digits>` query tokens in an HTML file.
pub struct CacheBustTask {
    config: CacheBustConfig,
    last_token: AtomicU64,
}

impl CacheBustTask {
    pub fn new(config: CacheBustConfig) -> Self {
        Self {
            config,
            last_token: AtomicU64::new(0),
        }
    }

    /// Milliseconds since the epoch, bumped so that every call returns a
    /// value greater than the previous one.
    fn next_token(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last_token.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_token.compare_exchange_weak(
                prev,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

impl Task for CacheBustTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Settlement> {
        Box::pin(async move {
            let target = ctx.resolve(&self.config.target);
            let token = self.next_token().to_string();

            match run_cache_bust(ctx.fs.as_ref(), &target, &self.config.marker, &token) {
                Ok(true) => {
                    ctx.reload.reload();
                    Settlement::Success
                }
                Ok(false) => Settlement::Success,
                Err(err) => Settlement::fatal("cache_bust", err),
            }
        })
    }
}

/// Replace the value of every `marker=<digits>` occurrence in `text` with
/// `token`. Returns `None` when there is nothing to replace.
pub fn rewrite_cache_bust(text: &str, marker: &str, token: &str) -> Option<String> {
    let pattern = format!(r"\b{}=\d+", regex::escape(marker));
    // The marker is escaped, so the pattern is always valid.
    let re = Regex::new(&pattern).ok()?;
    if !re.is_match(text) {
        return None;
    }
    let replacement = format!("{marker}={token}");
    Some(re.replace_all(text, NoExpand(&replacement)).into_owned())
}

/// Rewrite the cache-bust markers of `target` in place.
///
/// Returns whether the file was written. A file without markers is left
/// untouched; an unreadable file is an error.
pub fn run_cache_bust(fs: &dyn FileSystem, target: &Path, marker: &str, token: &str) -> Result<bool> {
    let text = fs
        .read_to_string(target)
        .with_context(|| format!("reading cache-bust target {:?}", target))?;

    match rewrite_cache_bust(&text, marker, token) {
        Some(updated) => {
            fs.write(target, updated.as_bytes())
                .with_context(|| format!("writing cache-bust target {:?}", target))?;
            info!(target = ?target, token, "cache-bust token updated");
            Ok(true)
        }
        None => {
            debug!(target = ?target, marker, "no cache-bust marker found; file untouched");
            Ok(false)
        }
    }
}
