use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Kind of filesystem change a watch binding can react to.
///
/// Mirrors the usual `add` / `change` / `unlink` vocabulary of front-end
/// watchers. Directory events are folded into the same three kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEventKind {
    Add,
    Change,
    Unlink,
}

impl WatchEventKind {
    pub const ALL: [WatchEventKind; 3] = [
        WatchEventKind::Add,
        WatchEventKind::Change,
        WatchEventKind::Unlink,
    ];
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchEventKind::Add => "add",
            WatchEventKind::Change => "change",
            WatchEventKind::Unlink => "unlink",
        };
        f.write_str(s)
    }
}

impl FromStr for WatchEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "add" => Ok(WatchEventKind::Add),
            "change" => Ok(WatchEventKind::Change),
            "unlink" => Ok(WatchEventKind::Unlink),
            other => Err(format!(
                "invalid watch event: {other} (expected \"add\", \"change\" or \"unlink\")"
            )),
        }
    }
}

/// CSS output style for compiled stylesheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    Compressed,
    Expanded,
}

impl Default for OutputStyle {
    fn default() -> Self {
        OutputStyle::Compressed
    }
}

/// Where the source map of a compiled stylesheet goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    /// Separate `<name>.css.map` next to the stylesheet.
    External,
    /// Base64 data URI appended to the stylesheet.
    Inline,
    /// No source map at all.
    None,
}

impl Default for SourceMapMode {
    fn default() -> Self {
        SourceMapMode::External
    }
}
