// src/watch/patterns.rs

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::fs::FileSystem;

/// A compiled list of source globs, as written in task configs.
///
/// - Plain entries include files, `!`-prefixed entries exclude them.
/// - Patterns are relative to the project root; a leading `./` is ignored.
/// - `*` does not cross directory separators, `**` does.
///
/// The order of include patterns is significant for [`PatternSet::expand`]:
/// files are returned pattern by pattern, so `["a.js", "*.js"]` puts `a.js`
/// first.
#[derive(Clone)]
pub struct PatternSet {
    includes: Vec<IncludePattern>,
    include_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

#[derive(Clone)]
struct IncludePattern {
    glob: String,
    base: String,
    matcher: GlobMatcher,
}

/// A file matched by a [`PatternSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Path as seen by the filesystem (`root.join(rel)`).
    pub path: PathBuf,
    /// Path relative to the project root, with forward slashes.
    pub rel: String,
    /// Static base of the pattern that matched, e.g. `app/scss` for
    /// `app/scss/**/*.scss`.
    pub base: String,
}

impl MatchedFile {
    /// Path relative to the static base of its pattern.
    pub fn rel_to_base(&self) -> &str {
        if self.base.is_empty() {
            return &self.rel;
        }
        self.rel
            .strip_prefix(&self.base)
            .map(|s| s.trim_start_matches('/'))
            .unwrap_or(&self.rel)
    }
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let globs: Vec<&str> = self.includes.iter().map(|p| p.glob.as_str()).collect();
        f.debug_struct("PatternSet")
            .field("includes", &globs)
            .finish_non_exhaustive()
    }
}

impl PatternSet {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut includes = Vec::new();
        let mut include_globs = Vec::new();
        let mut exclude_globs = Vec::new();

        for raw in patterns {
            if let Some(negated) = raw.strip_prefix('!') {
                exclude_globs.push(normalize_pattern(negated).to_string());
            } else {
                let glob = normalize_pattern(raw).to_string();
                let matcher = compile_glob(&glob)?.compile_matcher();
                includes.push(IncludePattern {
                    base: glob_base(&glob),
                    glob: glob.clone(),
                    matcher,
                });
                include_globs.push(glob);
            }
        }

        let include_set = build_globset(&include_globs)?;
        let exclude_set = if exclude_globs.is_empty() {
            None
        } else {
            Some(build_globset(&exclude_globs)?)
        };

        Ok(Self {
            includes,
            include_set,
            exclude_set,
        })
    }

    /// Returns true if the given path (relative to project root) is
    /// included and not excluded.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }

    /// Static bases of the include patterns, collapsed so that no base is
    /// nested inside another one.
    pub fn watch_bases(&self) -> Vec<String> {
        collapse_bases(self.includes.iter().map(|p| p.base.clone()).collect())
    }

    /// Resolve the patterns against `root`, in pattern order.
    pub fn expand(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<MatchedFile>> {
        let mut candidates = Vec::new();
        for base in self.watch_bases() {
            let dir = if base.is_empty() {
                root.to_path_buf()
            } else {
                root.join(&base)
            };
            if fs.is_dir(&dir) {
                collect_files(fs, root, &dir, &mut candidates)?;
            }
        }
        candidates.sort_by(|a, b| a.1.cmp(&b.1));

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for include in &self.includes {
            for (path, rel) in &candidates {
                if seen.contains(rel) || !include.matcher.is_match(rel) {
                    continue;
                }
                if let Some(exclude) = &self.exclude_set {
                    if exclude.is_match(rel) {
                        continue;
                    }
                }
                seen.insert(rel.clone());
                out.push(MatchedFile {
                    path: path.clone(),
                    rel: rel.clone(),
                    base: include.base.clone(),
                });
            }
        }

        Ok(out)
    }
}

fn normalize_pattern(pattern: &str) -> &str {
    pattern.trim_start_matches("./")
}

fn compile_glob(pattern: &str) -> Result<globset::Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("invalid glob pattern: {pattern}"))
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(compile_glob(pat)?);
    }
    Ok(builder.build()?)
}

/// Longest leading run of path components without glob metacharacters.
///
/// A pattern without any wildcard names a single file, so its base is the
/// file's parent directory. The root is represented by `""`.
pub fn glob_base(pattern: &str) -> String {
    let components: Vec<&str> = normalize_pattern(pattern)
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    let split_idx = components
        .iter()
        .position(|c| c.contains(['*', '?', '[', '{']))
        .unwrap_or(components.len().saturating_sub(1));

    components[..split_idx].join("/")
}

/// Reduces a set of bases to the minimal set of recursive watch roots.
///
/// If we watch `a` and `a/b`, we only need `a`. The root (`""`) covers
/// everything.
fn collapse_bases(bases: Vec<String>) -> Vec<String> {
    let mut bases = bases;
    bases.sort();
    bases.dedup();

    let mut filtered: Vec<String> = Vec::new();
    for base in bases {
        if let Some(last) = filtered.last() {
            if last.is_empty() || base == *last || base.starts_with(&format!("{last}/")) {
                continue;
            }
        }
        filtered.push(base);
    }
    filtered
}

fn collect_files(
    fs: &dyn FileSystem,
    root: &Path,
    dir: &Path,
    out: &mut Vec<(PathBuf, String)>,
) -> Result<()> {
    let mut stack = vec![dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    out.push((path, rel_str));
                }
            }
        }
    }

    Ok(())
}
