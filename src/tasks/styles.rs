// src/tasks/styles.rs

use std::io;
use std::path::{Component, Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use tracing::{debug, info};

use crate::config::StylesConfig;
use crate::fs::FileSystem;
use crate::graph::{BoxFuture, Settlement};
use crate::tasks::{Task, TaskContext};
use crate::types::{OutputStyle, SourceMapMode};
use crate::watch::{MatchedFile, PatternSet};

/// Compiles SCSS entry files to CSS with `grass`.
pub struct StylesTask {
    config: StylesConfig,
}

/// Lets `grass` resolve imports through our filesystem abstraction.
#[derive(Debug)]
struct GrassFs<'a>(&'a dyn FileSystem);

impl grass::Fs for GrassFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        self.0.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.0.is_file(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.0
            .read(path)
            .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("{e:#}")))
    }
}

impl StylesTask {
    pub fn new(config: StylesConfig) -> Self {
        Self { config }
    }

    fn compile(&self, fs: &dyn FileSystem, entry: &MatchedFile) -> Result<String, String> {
        let grass_fs = GrassFs(fs);
        let style = match self.config.output_style {
            OutputStyle::Compressed => grass::OutputStyle::Compressed,
            OutputStyle::Expanded => grass::OutputStyle::Expanded,
        };
        let load_path = entry.path.parent().map(Path::to_path_buf).unwrap_or_default();
        let options = grass::Options::default()
            .fs(&grass_fs)
            .style(style)
            .load_path(load_path);

        grass::from_path(&entry.path, &options).map_err(|e| format!("{}: {}", entry.rel, e))
    }

    /// Write the stylesheet (and map) for one entry, keeping its path below
    /// the glob base; returns the CSS path relative to the project root.
    fn emit(
        &self,
        ctx: &TaskContext,
        entry: &MatchedFile,
        source: &str,
        mut css: String,
    ) -> anyhow::Result<String> {
        let rel_css = css_path(entry.rel_to_base());
        let css_name = file_name(&rel_css);
        let map_name = format!("{css_name}.map");
        let dest = self.config.dest.trim_end_matches('/');
        let out_rel = if dest.is_empty() || dest == "." {
            rel_css.clone()
        } else {
            format!("{dest}/{rel_css}")
        };
        let out_path = ctx.resolve(&self.config.dest).join(&rel_css);

        let out_dir = Path::new(&out_rel).parent().unwrap_or(Path::new(""));
        let map = source_map(
            &css_name,
            &relative_to(&out_dir.to_string_lossy(), &entry.rel),
            source,
        );

        match self.config.source_map {
            SourceMapMode::External => {
                if !css.ends_with('\n') {
                    css.push('\n');
                }
                css.push_str(&format!("/*# sourceMappingURL={map_name} */\n"));
                ctx.fs.write(&out_path.with_file_name(&map_name), map.as_bytes())?;
            }
            SourceMapMode::Inline => {
                if !css.ends_with('\n') {
                    css.push('\n');
                }
                css.push_str(&format!(
                    "/*# sourceMappingURL=data:application/json;charset=utf-8;base64,{} */\n",
                    BASE64.encode(map.as_bytes())
                ));
            }
            SourceMapMode::None => {}
        }

        ctx.fs.write(&out_path, css.as_bytes())?;
        debug!(entry = %entry.rel, css = %out_rel, "stylesheet written");
        Ok(out_rel)
    }
}

impl Task for StylesTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Settlement> {
        Box::pin(async move {
            let entries = match PatternSet::new(&self.config.src)
                .and_then(|p| p.expand(ctx.fs.as_ref(), &ctx.root))
            {
                Ok(files) => files,
                Err(err) => return Settlement::fatal("styles", err),
            };

            let mut written = Vec::new();
            let mut errors = Vec::new();

            for entry in entries.iter().filter(|e| !is_partial(&e.rel)) {
                let source = match ctx.fs.read_to_string(&entry.path) {
                    Ok(s) => s,
                    Err(err) => return Settlement::fatal("styles", err),
                };
                match self.compile(ctx.fs.as_ref(), entry) {
                    Ok(css) => match self.emit(ctx, entry, &source, css) {
                        Ok(path) => written.push(path),
                        Err(err) => return Settlement::fatal("styles", err),
                    },
                    Err(message) => errors.push(message),
                }
            }

            if !errors.is_empty() {
                return Settlement::recovered("sass", errors.join("\n"));
            }

            if !written.is_empty() {
                info!(files = written.len(), "stylesheets compiled");
                ctx.reload.inject_css(&written);
            }
            Settlement::Success
        })
    }
}

fn is_partial(rel: &str) -> bool {
    rel.rsplit('/').next().is_some_and(|name| name.starts_with('_'))
}

/// `admin/main.scss` -> `admin/main.css`.
fn css_path(rel: &str) -> String {
    Path::new(rel)
        .with_extension("css")
        .to_string_lossy()
        .replace('\\', "/")
}

fn file_name(rel: &str) -> String {
    rel.rsplit('/').next().unwrap_or(rel).to_string()
}

/// Version 3 source map anchoring the stylesheet to its entry file.
fn source_map(file: &str, source: &str, content: &str) -> String {
    json!({
        "version": 3,
        "file": file,
        "sources": [source],
        "sourcesContent": [content],
        "names": [],
        "mappings": "AAAA",
    })
    .to_string()
}

/// Path of `target` as seen from directory `from_dir` (both root-relative).
fn relative_to(from_dir: &str, target: &str) -> String {
    let from: Vec<_> = normal_components(Path::new(from_dir));
    let to: Vec<_> = normal_components(Path::new(target));

    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut out = PathBuf::new();
    for _ in common..from.len() {
        out.push("..");
    }
    for part in &to[common..] {
        out.push(part);
    }
    out.to_string_lossy().replace('\\', "/")
}

fn normal_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
