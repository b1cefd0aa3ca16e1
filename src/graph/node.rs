// src/graph/node.rs

use std::fmt::Write as _;

use crate::config::NodeSpec;

/// A node of the task graph.
///
/// `Task(name)` resolves at run time to either a registered leaf task or a
/// registered named graph, so graphs compose recursively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Task(String),
    Sequence(Vec<Node>),
    Parallel(Vec<Node>),
}

impl Node {
    pub fn task(name: impl Into<String>) -> Self {
        Node::Task(name.into())
    }

    /// Run children one after another.
    pub fn sequence(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Sequence(children.into_iter().collect())
    }

    /// Run children concurrently and wait for all of them.
    pub fn parallel(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Parallel(children.into_iter().collect())
    }

    /// Short human-readable label, e.g. `series(lint, parallel(css, js))`.
    pub fn label(&self) -> String {
        match self {
            Node::Task(name) => name.clone(),
            Node::Sequence(children) => format!("series({})", join_labels(children)),
            Node::Parallel(children) => format!("parallel({})", join_labels(children)),
        }
    }

    /// Indented multi-line rendering used by `--dry-run`.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, 0);
        out
    }

    fn write_tree(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            Node::Task(name) => {
                let _ = writeln!(out, "{indent}- {name}");
            }
            Node::Sequence(children) => {
                let _ = writeln!(out, "{indent}series:");
                for child in children {
                    child.write_tree(out, depth + 1);
                }
            }
            Node::Parallel(children) => {
                let _ = writeln!(out, "{indent}parallel:");
                for child in children {
                    child.write_tree(out, depth + 1);
                }
            }
        }
    }
}

fn join_labels(children: &[Node]) -> String {
    children
        .iter()
        .map(Node::label)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<&NodeSpec> for Node {
    fn from(spec: &NodeSpec) -> Self {
        match spec {
            NodeSpec::Ref(name) => Node::Task(name.clone()),
            NodeSpec::Series { series } => Node::Sequence(series.iter().map(Node::from).collect()),
            NodeSpec::Parallel { parallel } => {
                Node::Parallel(parallel.iter().map(Node::from).collect())
            }
        }
    }
}
