// src/graph/registry.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::debug;

use crate::config::ConfigFile;
use crate::graph::Node;
use crate::notifier::{ErrorBridge, Notifier};
use crate::tasks::{self, Task};

/// Named leaf tasks and named graphs, built once at startup.
///
/// A name is either a task or a graph, never both. Graph nodes refer to
/// other entries by name and are resolved when they run.
#[derive(Default)]
pub struct Registry {
    tasks: BTreeMap<String, Arc<dyn Task>>,
    graphs: BTreeMap<String, Node>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .field("graphs", &self.graphs)
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every task and graph declared in `cfg`.
    ///
    /// Tasks configured with `notify = true` are wrapped in an
    /// [`ErrorBridge`] that reports to `notifier`.
    pub fn from_config(cfg: &ConfigFile, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let mut registry = Self::new();

        for (name, task_cfg) in cfg.tasks() {
            let mut task = tasks::build_task(task_cfg, cfg.server());
            if task_cfg.notify {
                task = ErrorBridge::install(task, notifier.clone());
            }
            debug!(task = %name, kind = task_cfg.kind.label(), notify = task_cfg.notify, "registered task");
            registry.register_task(name.clone(), task)?;
        }

        for (name, spec) in cfg.graphs() {
            registry.register_graph(name.clone(), Node::from(spec))?;
        }

        Ok(registry)
    }

    pub fn register_task(&mut self, name: impl Into<String>, task: Arc<dyn Task>) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            bail!("'{name}' is already registered");
        }
        self.tasks.insert(name, task);
        Ok(())
    }

    pub fn register_graph(&mut self, name: impl Into<String>, node: Node) -> Result<()> {
        let name = name.into();
        if self.contains(&name) {
            bail!("'{name}' is already registered");
        }
        self.graphs.insert(name, node);
        Ok(())
    }

    pub fn task(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn graph(&self, name: &str) -> Option<&Node> {
        self.graphs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name) || self.graphs.contains_key(name)
    }

    /// Expand `name` into its graph if it is one, recursively, for display.
    pub fn expand(&self, name: &str) -> Node {
        self.expand_node(&Node::task(name), 0)
    }

    fn expand_node(&self, node: &Node, depth: usize) -> Node {
        // Validated configs are acyclic; the depth cap only guards
        // hand-built registries.
        if depth > 64 {
            return node.clone();
        }
        match node {
            Node::Task(name) => match self.graphs.get(name) {
                Some(graph) => self.expand_node(graph, depth + 1),
                None => node.clone(),
            },
            Node::Sequence(children) => {
                Node::Sequence(children.iter().map(|c| self.expand_node(c, depth + 1)).collect())
            }
            Node::Parallel(children) => {
                Node::Parallel(children.iter().map(|c| self.expand_node(c, depth + 1)).collect())
            }
        }
    }
}
