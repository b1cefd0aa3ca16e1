// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, NodeSpec, RawConfigFile, TaskKind};
use crate::errors::{AssetflowError, Result};
use crate::watch::patterns::PatternSet;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::AssetflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_server(cfg)?;
    validate_names(cfg)?;
    validate_tasks(cfg)?;
    validate_references(cfg)?;
    validate_graph_cycles(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(AssetflowError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.port == cfg.server.reload_port {
        return Err(AssetflowError::ConfigError(format!(
            "[server].port and [server].reload_port must differ (both {})",
            cfg.server.port
        )));
    }
    Ok(())
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.graph.keys() {
        if cfg.task.contains_key(name) {
            return Err(AssetflowError::ConfigError(format!(
                "'{}' is defined both as a task and as a graph",
                name
            )));
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let globs: &[String] = match &task.kind {
            TaskKind::Styles(c) => &c.src,
            TaskKind::Scripts(c) => &c.src,
            TaskKind::Images(c) => &c.src,
            TaskKind::Lint(c) => &c.src,
            TaskKind::Watch(c) => &c.paths,
            TaskKind::CacheBust(c) => {
                if c.marker.trim().is_empty() {
                    return Err(AssetflowError::ConfigError(format!(
                        "task '{}': cache-bust marker must not be empty",
                        name
                    )));
                }
                &[]
            }
            TaskKind::Serve => &[],
        };

        if let TaskKind::Images(c) = &task.kind {
            if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
                return Err(AssetflowError::ConfigError(format!(
                    "task '{}': jpeg_quality must be within 1..=100 (got {})",
                    name, c.jpeg_quality
                )));
            }
        }

        if let TaskKind::Watch(c) = &task.kind {
            if c.paths.is_empty() {
                return Err(AssetflowError::ConfigError(format!(
                    "task '{}': watch needs at least one path",
                    name
                )));
            }
            if c.events.is_empty() {
                return Err(AssetflowError::ConfigError(format!(
                    "task '{}': watch `events` must not be empty",
                    name
                )));
            }
        }

        if task.notify && matches!(task.kind, TaskKind::Watch(_) | TaskKind::Serve) {
            return Err(AssetflowError::ConfigError(format!(
                "task '{}': `notify` is only supported on build tasks",
                name
            )));
        }

        PatternSet::new(globs).map_err(|e| {
            AssetflowError::ConfigError(format!("task '{}': {:#}", name, e))
        })?;
    }
    Ok(())
}

fn validate_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, node) in cfg.graph.iter() {
        validate_node(cfg, &format!("graph '{}'", name), node)?;
    }
    for (name, task) in cfg.task.iter() {
        if let TaskKind::Watch(w) = &task.kind {
            validate_node(cfg, &format!("task '{}' (run)", name), &w.run)?;
        }
    }
    Ok(())
}

fn validate_node(cfg: &RawConfigFile, owner: &str, node: &NodeSpec) -> Result<()> {
    match node {
        NodeSpec::Ref(name) => {
            if !cfg.task.contains_key(name) && !cfg.graph.contains_key(name) {
                return Err(AssetflowError::ConfigError(format!(
                    "{} references unknown task or graph '{}'",
                    owner, name
                )));
            }
        }
        NodeSpec::Series { series: children } => {
            if children.is_empty() {
                return Err(AssetflowError::ConfigError(format!(
                    "{} contains an empty series",
                    owner
                )));
            }
            for child in children {
                validate_node(cfg, owner, child)?;
            }
        }
        NodeSpec::Parallel { parallel: children } => {
            if children.is_empty() {
                return Err(AssetflowError::ConfigError(format!(
                    "{} contains an empty parallel group",
                    owner
                )));
            }
            for child in children {
                validate_node(cfg, owner, child)?;
            }
        }
    }
    Ok(())
}

fn validate_graph_cycles(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: owner -> referenced name.
    //
    // Graphs own the names they reference; a watch task owns the names its
    // `run` node references (a watch that re-binds itself on every batch
    // would grow without bound).
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys().chain(cfg.graph.keys()) {
        graph.add_node(name.as_str());
    }

    for (name, node) in cfg.graph.iter() {
        for target in node.references() {
            graph.add_edge(name.as_str(), target, ());
        }
    }

    for (name, task) in cfg.task.iter() {
        if let TaskKind::Watch(w) = &task.kind {
            for target in w.run.references() {
                graph.add_edge(name.as_str(), target, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(AssetflowError::GraphCycle(format!(
                "cycle detected in task graph involving '{}'",
                node
            )))
        }
    }
}
