// src/watch/binding.rs

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::graph::Node;
use crate::watch::patterns::PatternSet;
use crate::watch::watcher::{ChangeEvent, FileWatcher, WatchOptions, WatcherHandle};

/// A live watch binding. Dropping it stops watching.
#[derive(Debug)]
pub struct WatchBinding {
    _handle: WatcherHandle,
    forwarder: JoinHandle<()>,
}

impl Drop for WatchBinding {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Bind `node` to changes of files matching `globs` under `root`.
///
/// Every batch of qualifying events triggers exactly one run of `node`
/// through `events_tx`. A batch ends once no new event arrived for
/// `options.delay_ms`. Runs are never serialised: a batch that arrives while
/// an earlier run is still going starts another run.
pub async fn bind_watch(
    watcher: &dyn FileWatcher,
    root: &Path,
    globs: &[String],
    node: Node,
    options: WatchOptions,
    events_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatchBinding> {
    let patterns = PatternSet::new(globs)?;
    let (handle, rx) = watcher
        .watch(root, &patterns, &options)
        .with_context(|| format!("watching {:?}", globs))?;

    info!(node = %node.label(), globs = ?globs, "watch bound");

    if !options.ignore_initial {
        events_tx
            .send(RuntimeEvent::Triggered {
                node: node.clone(),
                reason: TriggerReason::Initial,
            })
            .await
            .context("runtime channel closed")?;
    }

    let delay = Duration::from_millis(options.delay_ms);
    let forwarder = tokio::spawn(forward_batches(rx, node, delay, events_tx));

    Ok(WatchBinding {
        _handle: handle,
        forwarder,
    })
}

async fn forward_batches(
    mut rx: mpsc::UnboundedReceiver<ChangeEvent>,
    node: Node,
    delay: Duration,
    events_tx: mpsc::Sender<RuntimeEvent>,
) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        let mut closed = false;

        loop {
            match tokio::time::timeout(delay, rx.recv()).await {
                Ok(Some(event)) => batch.push(event),
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_elapsed) => break,
            }
        }

        for event in &batch {
            debug!(kind = %event.kind, path = %event.rel, "batched change");
        }
        info!(
            node = %node.label(),
            changes = batch.len(),
            first = %batch[0].rel,
            "change detected, triggering run"
        );

        let trigger = RuntimeEvent::Triggered {
            node: node.clone(),
            reason: TriggerReason::FileWatch {
                changes: batch.len(),
            },
        };
        if events_tx.send(trigger).await.is_err() || closed {
            break;
        }
    }
    debug!("watch forwarder finished");
}
