// src/notifier/bridge.rs

use std::sync::Arc;

use crate::graph::{BoxFuture, Settlement};
use crate::notifier::Notifier;
use crate::tasks::{Task, TaskContext};

/// Wraps a leaf task so that its recovered errors reach a [`Notifier`].
///
/// The wrapped task never becomes fatal because of the bridge: a recovered
/// error is reported once and passed on as recovered. Success and fatal
/// settlements pass through untouched.
pub struct ErrorBridge {
    inner: Arc<dyn Task>,
    notifier: Arc<dyn Notifier>,
}

impl ErrorBridge {
    pub fn install(task: Arc<dyn Task>, notifier: Arc<dyn Notifier>) -> Arc<dyn Task> {
        Arc::new(Self {
            inner: task,
            notifier,
        })
    }
}

impl Task for ErrorBridge {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Settlement> {
        Box::pin(async move {
            let settlement = self.inner.run(ctx).await;
            if let Settlement::Recovered(record) = &settlement {
                self.notifier.notify(record);
            }
            settlement
        })
    }
}
