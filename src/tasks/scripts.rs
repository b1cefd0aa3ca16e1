// src/tasks/scripts.rs

use anyhow::Context;
use tracing::{debug, info};

use crate::config::ScriptsConfig;
use crate::exec::run_filter;
use crate::graph::{BoxFuture, Settlement};
use crate::tasks::{Task, TaskContext};
use crate::watch::PatternSet;

/// Concatenates script sources into one bundle, optionally minified by an
/// external command.
pub struct ScriptsTask {
    config: ScriptsConfig,
}

impl ScriptsTask {
    pub fn new(config: ScriptsConfig) -> Self {
        Self { config }
    }

    /// Concatenation of all sources in glob order, joined by newlines.
    pub fn concat(&self, ctx: &TaskContext) -> anyhow::Result<(usize, Vec<u8>)> {
        let patterns = PatternSet::new(&self.config.src)?;
        let files = patterns.expand(ctx.fs.as_ref(), &ctx.root)?;

        let mut bundle = Vec::new();
        for (i, file) in files.iter().enumerate() {
            if i > 0 {
                bundle.push(b'\n');
            }
            let bytes = ctx
                .fs
                .read(&file.path)
                .with_context(|| format!("reading script {}", file.rel))?;
            debug!(file = %file.rel, bytes = bytes.len(), "bundling");
            bundle.extend_from_slice(&bytes);
        }
        Ok((files.len(), bundle))
    }
}

impl Task for ScriptsTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Settlement> {
        Box::pin(async move {
            let (count, mut bundle) = match self.concat(ctx) {
                Ok(res) => res,
                Err(err) => return Settlement::fatal("scripts", err),
            };

            if let Some(cmd) = &self.config.minify_cmd {
                match run_filter(cmd, &ctx.root, bundle).await {
                    Ok(out) if out.success => bundle = out.stdout,
                    Ok(out) => {
                        let message = format!(
                            "`{cmd}` exited with {}: {}",
                            out.exit_code,
                            out.stderr.trim()
                        );
                        return Settlement::recovered("minify", message);
                    }
                    Err(err) => return Settlement::fatal("scripts", err),
                }
            }

            let dest = ctx.resolve(&self.config.dest).join(&self.config.bundle);
            if let Err(err) = ctx.fs.write(&dest, &bundle) {
                return Settlement::fatal("scripts", err);
            }

            info!(files = count, bytes = bundle.len(), dest = ?dest, "bundle written");
            ctx.reload.reload();
            Settlement::Success
        })
    }
}
