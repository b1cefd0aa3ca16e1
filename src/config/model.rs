// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{OutputStyle, SourceMapMode, WatchEventKind};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// port = 3000
///
/// [task.styles]
/// kind = "styles"
/// src = ["app/scss/**/*.scss"]
/// dest = "dist"
///
/// [task.scripts]
/// kind = "scripts"
/// src = ["app/js/**/*.js"]
/// dest = "dist"
///
/// [graph]
/// default = { series = [{ parallel = ["styles", "scripts"] }] }
/// ```
///
/// Deserialization yields a [`RawConfigFile`]; only
/// [`ConfigFile::try_from`] (see `validate.rs`) produces a checked
/// [`ConfigFile`].
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Preview server settings from `[server]`.
    #[serde(default)]
    pub server: ServerSection,

    /// Error notifier settings from `[notifier]`.
    #[serde(default)]
    pub notifier: NotifierSection,

    /// All leaf tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Named compositions from `[graph]`.
    #[serde(default)]
    pub graph: BTreeMap<String, NodeSpec>,
}

/// Validated configuration.
///
/// Fields are private so the only way to obtain one is through validation.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    server: ServerSection,
    notifier: NotifierSection,
    task: BTreeMap<String, TaskConfig>,
    graph: BTreeMap<String, NodeSpec>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            server: raw.server,
            notifier: raw.notifier,
            task: raw.task,
            graph: raw.graph,
        }
    }

    pub fn server(&self) -> &ServerSection {
        &self.server
    }

    pub fn notifier(&self) -> &NotifierSection {
        &self.notifier
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn graphs(&self) -> &BTreeMap<String, NodeSpec> {
        &self.graph
    }

    /// Whether `name` is a registered task or graph.
    pub fn has_entry(&self, name: &str) -> bool {
        self.task.contains_key(name) || self.graph.contains_key(name)
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served by the preview server, relative to the project root.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Port of the live-reload websocket.
    #[serde(default = "default_reload_port")]
    pub reload_port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_base_dir() -> String {
    ".".to_string()
}

fn default_reload_port() -> u16 {
    35729
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_dir: default_base_dir(),
            reload_port: default_reload_port(),
        }
    }
}

/// `[notifier]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierSection {
    /// Show a desktop popup for bridged errors.
    #[serde(default = "default_true")]
    pub desktop: bool,

    /// Ring the terminal bell for bridged errors.
    #[serde(default = "default_true")]
    pub beep: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotifierSection {
    fn default() -> Self {
        Self {
            desktop: true,
            beep: true,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Wrap this task in the error bridge (desktop popup + beep on
    /// recoverable errors).
    #[serde(default)]
    pub notify: bool,

    #[serde(flatten)]
    pub kind: TaskKind,
}

/// Kind-specific part of a task, selected by `kind = "..."`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    Styles(StylesConfig),
    Scripts(ScriptsConfig),
    CacheBust(CacheBustConfig),
    Images(ImagesConfig),
    Lint(LintConfig),
    Serve,
    Watch(WatchConfig),
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Styles(_) => "styles",
            TaskKind::Scripts(_) => "scripts",
            TaskKind::CacheBust(_) => "cache_bust",
            TaskKind::Images(_) => "images",
            TaskKind::Lint(_) => "lint",
            TaskKind::Serve => "serve",
            TaskKind::Watch(_) => "watch",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StylesConfig {
    #[serde(default = "default_styles_src")]
    pub src: Vec<String>,

    #[serde(default = "default_dest")]
    pub dest: String,

    #[serde(default)]
    pub output_style: OutputStyle,

    #[serde(default)]
    pub source_map: SourceMapMode,
}

fn default_styles_src() -> Vec<String> {
    vec!["app/scss/**/*.scss".to_string()]
}

fn default_dest() -> String {
    "dist".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptsConfig {
    #[serde(default = "default_scripts_src")]
    pub src: Vec<String>,

    #[serde(default = "default_dest")]
    pub dest: String,

    /// File name of the bundle inside `dest`.
    #[serde(default = "default_bundle")]
    pub bundle: String,

    /// External minifier; reads the bundle on stdin, writes it on stdout.
    #[serde(default)]
    pub minify_cmd: Option<String>,
}

fn default_scripts_src() -> Vec<String> {
    vec!["app/js/**/*.js".to_string()]
}

fn default_bundle() -> String {
    "all.js".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheBustConfig {
    #[serde(default = "default_cache_bust_target")]
    pub target: String,

    /// Query key whose numeric value is replaced (`cb` matches `cb=123`).
    #[serde(default = "default_marker")]
    pub marker: String,
}

fn default_cache_bust_target() -> String {
    "index.html".to_string()
}

fn default_marker() -> String {
    "cb".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagesConfig {
    #[serde(default = "default_images_src")]
    pub src: Vec<String>,

    #[serde(default = "default_images_dest")]
    pub dest: String,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_images_src() -> Vec<String> {
    vec!["assets/img/**/*".to_string()]
}

fn default_images_dest() -> String {
    "_site/assets/img".to_string()
}

fn default_jpeg_quality() -> u8 {
    85
}

#[derive(Debug, Clone, Deserialize)]
pub struct LintConfig {
    #[serde(default = "default_lint_src")]
    pub src: Vec<String>,

    /// YAML rules file in sass-lint format.
    #[serde(default = "default_lint_rules")]
    pub config: String,
}

fn default_lint_src() -> Vec<String> {
    vec!["scss/**/*.scss".to_string()]
}

fn default_lint_rules() -> String {
    ".sass-lint.yml".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    /// Globs to observe, relative to the project root.
    pub paths: Vec<String>,

    /// Node to run for every batch of qualifying changes.
    pub run: NodeSpec,

    /// Poll instead of relying on native notifications (containers, network
    /// filesystems).
    #[serde(default)]
    pub use_polling: bool,

    /// Poll interval in milliseconds (only used with `use_polling`).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Events closer together than this are one batch.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    #[serde(default = "default_events")]
    pub events: Vec<WatchEventKind>,

    /// When false, `run` is also triggered once at bind time.
    #[serde(default = "default_true")]
    pub ignore_initial: bool,
}

fn default_interval_ms() -> u64 {
    100
}

fn default_delay_ms() -> u64 {
    200
}

fn default_events() -> Vec<WatchEventKind> {
    WatchEventKind::ALL.to_vec()
}

/// A node of the task graph as written in TOML.
///
/// - `"name"` references a task or another graph,
/// - `{ series = [...] }` runs children one after another,
/// - `{ parallel = [...] }` runs children concurrently.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NodeSpec {
    Ref(String),
    Series {
        #[serde(alias = "sequence")]
        series: Vec<NodeSpec>,
    },
    Parallel {
        parallel: Vec<NodeSpec>,
    },
}

impl NodeSpec {
    /// Every task/graph name referenced anywhere below this node.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            NodeSpec::Ref(name) => out.push(name.as_str()),
            NodeSpec::Series { series: children }
            | NodeSpec::Parallel { parallel: children } => {
                for child in children {
                    child.collect_references(out);
                }
            }
        }
    }
}
