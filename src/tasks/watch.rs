// src/tasks/watch.rs

use crate::graph::{BoxFuture, Node, Settlement};
use crate::tasks::{Task, TaskContext};
use crate::watch::{bind_watch, WatchOptions};

/// Binds a watch and then stays running for the life of the process.
pub struct WatchTask {
    paths: Vec<String>,
    run: Node,
    options: WatchOptions,
}

impl WatchTask {
    pub fn new(paths: Vec<String>, run: Node, options: WatchOptions) -> Self {
        Self { paths, run, options }
    }
}

impl Task for WatchTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Settlement> {
        Box::pin(async move {
            let binding = bind_watch(
                ctx.watcher.as_ref(),
                &ctx.root,
                &self.paths,
                self.run.clone(),
                self.options.clone(),
                ctx.events.clone(),
            )
            .await;

            match binding {
                Ok(_binding) => {
                    std::future::pending::<()>().await;
                    Settlement::Success
                }
                Err(err) => Settlement::fatal("watch", err),
            }
        })
    }
}
