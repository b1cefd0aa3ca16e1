#![allow(dead_code)]

use std::collections::BTreeMap;

use assetflow::config::{
    CacheBustConfig, ConfigFile, NodeSpec, NotifierSection, RawConfigFile, ScriptsConfig,
    ServerSection, StylesConfig, TaskConfig, TaskKind, WatchConfig,
};
use assetflow::errors::Result;
use assetflow::types::{OutputStyle, SourceMapMode, WatchEventKind};

/// Builder for `RawConfigFile` / `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                server: ServerSection::default(),
                notifier: NotifierSection::default(),
                task: BTreeMap::new(),
                graph: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, kind: TaskKind) -> Self {
        self.config
            .task
            .insert(name.to_string(), TaskConfig { notify: false, kind });
        self
    }

    pub fn with_notified_task(mut self, name: &str, kind: TaskKind) -> Self {
        self.config
            .task
            .insert(name.to_string(), TaskConfig { notify: true, kind });
        self
    }

    pub fn with_graph(mut self, name: &str, node: NodeSpec) -> Self {
        self.config.graph.insert(name.to_string(), node);
        self
    }

    pub fn with_ports(mut self, port: u16, reload_port: u16) -> Self {
        self.config.server.port = port;
        self.config.server.reload_port = reload_port;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `"name"` reference.
pub fn r(name: &str) -> NodeSpec {
    NodeSpec::Ref(name.to_string())
}

pub fn series(children: Vec<NodeSpec>) -> NodeSpec {
    NodeSpec::Series { series: children }
}

pub fn parallel(children: Vec<NodeSpec>) -> NodeSpec {
    NodeSpec::Parallel { parallel: children }
}

pub fn styles(src: &[&str], dest: &str) -> TaskKind {
    TaskKind::Styles(StylesConfig {
        src: src.iter().map(|s| s.to_string()).collect(),
        dest: dest.to_string(),
        output_style: OutputStyle::Compressed,
        source_map: SourceMapMode::External,
    })
}

pub fn scripts(src: &[&str], dest: &str) -> TaskKind {
    TaskKind::Scripts(ScriptsConfig {
        src: src.iter().map(|s| s.to_string()).collect(),
        dest: dest.to_string(),
        bundle: "all.js".to_string(),
        minify_cmd: None,
    })
}

pub fn cache_bust(target: &str) -> TaskKind {
    TaskKind::CacheBust(CacheBustConfig {
        target: target.to_string(),
        marker: "cb".to_string(),
    })
}

pub fn watch(paths: &[&str], run: NodeSpec) -> TaskKind {
    TaskKind::Watch(WatchConfig {
        paths: paths.iter().map(|s| s.to_string()).collect(),
        run,
        use_polling: false,
        interval_ms: 100,
        delay_ms: 200,
        events: WatchEventKind::ALL.to_vec(),
        ignore_initial: true,
    })
}
