// src/tasks/serve.rs

use tokio::sync::Mutex;
use tracing::info;

use crate::config::ServerSection;
use crate::graph::{BoxFuture, Settlement};
use crate::server::start_preview;
use crate::tasks::{Task, TaskContext};

/// Starts the preview server and the live-reload listener.
///
/// Settles once both are bound; the servers keep running in the
/// background. Running it again in the same process does nothing.
pub struct ServeTask {
    server: ServerSection,
    started: Mutex<bool>,
}

impl ServeTask {
    pub fn new(server: ServerSection) -> Self {
        Self {
            server,
            started: Mutex::new(false),
        }
    }
}

impl Task for ServeTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Settlement> {
        Box::pin(async move {
            let mut started = self.started.lock().await;
            if *started {
                info!("preview server already running");
                return Settlement::Success;
            }

            let reload_port = match ctx.reload.listen(&self.server.host, self.server.reload_port) {
                Ok(port) => port,
                Err(err) => return Settlement::fatal("serve", err),
            };

            let base_dir = ctx.resolve(&self.server.base_dir);
            match start_preview(&self.server.host, self.server.port, base_dir, reload_port).await {
                Ok(addr) => {
                    info!(%addr, reload_port, "serving");
                    *started = true;
                    Settlement::Success
                }
                Err(err) => Settlement::fatal("serve", err),
            }
        })
    }
}
