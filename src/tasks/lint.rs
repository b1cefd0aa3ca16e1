// src/tasks/lint.rs

//! Style linting with sass-lint compatible rule files.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde_yaml::Value;
use tracing::{debug, info, warn};

use crate::config::LintConfig;
use crate::graph::{BoxFuture, Settlement};
use crate::tasks::{Task, TaskContext};
use crate::watch::PatternSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    NoImportant,
    NoIds,
    NoTrailingWhitespace,
    FinalNewline,
    MaxLineLength { length: usize },
    Indentation { size: usize },
    NoEmptyRulesets,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::NoImportant => "no-important",
            Rule::NoIds => "no-ids",
            Rule::NoTrailingWhitespace => "no-trailing-whitespace",
            Rule::FinalNewline => "final-newline",
            Rule::MaxLineLength { .. } => "max-line-length",
            Rule::Indentation { .. } => "indentation",
            Rule::NoEmptyRulesets => "no-empty-rulesets",
        }
    }
}

/// Enabled rules with their severities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<(Rule, Severity)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub line: usize,
    pub column: usize,
    pub rule: &'static str,
    pub severity: Severity,
    pub message: String,
}

impl RuleSet {
    /// Parse a sass-lint YAML rules file.
    ///
    /// ```yaml
    /// rules:
    ///   no-important: 2
    ///   max-line-length: [1, { length: 100 }]
    /// ```
    pub fn from_yaml(text: &str) -> Result<Self> {
        let doc: Value = serde_yaml::from_str(text).context("parsing lint rules")?;
        let Some(rules) = doc.get("rules") else {
            return Ok(Self::default());
        };
        let Some(rules) = rules.as_mapping() else {
            bail!("`rules` must be a mapping");
        };

        let mut out = Vec::new();
        for (name, value) in rules {
            let Some(name) = name.as_str() else {
                bail!("rule names must be strings");
            };
            let (level, options) = match value {
                Value::Sequence(items) => (items.first().and_then(Value::as_u64), items.get(1)),
                other => (other.as_u64(), None),
            };
            let severity = match level {
                Some(0) => continue,
                Some(1) => Severity::Warning,
                Some(2) => Severity::Error,
                _ => bail!("rule '{name}': severity must be 0, 1 or 2"),
            };
            let option = |key: &str, default: usize| {
                options
                    .and_then(|o| o.get(key))
                    .and_then(Value::as_u64)
                    .map(|v| v as usize)
                    .unwrap_or(default)
            };

            let rule = match name {
                "no-important" => Rule::NoImportant,
                "no-ids" => Rule::NoIds,
                "no-trailing-whitespace" => Rule::NoTrailingWhitespace,
                "final-newline" => Rule::FinalNewline,
                "max-line-length" => Rule::MaxLineLength {
                    length: option("length", 80),
                },
                "indentation" => Rule::Indentation {
                    size: option("size", 2).max(1),
                },
                "no-empty-rulesets" => Rule::NoEmptyRulesets,
                other => {
                    debug!(rule = other, "unsupported lint rule ignored");
                    continue;
                }
            };
            out.push((rule, severity));
        }

        Ok(Self { rules: out })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Lint one file, violations sorted by position.
    pub fn check(&self, text: &str) -> Vec<Violation> {
        let mut out = Vec::new();
        for (rule, severity) in &self.rules {
            check_rule(*rule, *severity, text, &mut out);
        }
        out.sort_by_key(|v| (v.line, v.column));
        out
    }
}

fn check_rule(rule: Rule, severity: Severity, text: &str, out: &mut Vec<Violation>) {
    let mut push = |line: usize, column: usize, message: String| {
        out.push(Violation {
            line,
            column,
            rule: rule.name(),
            severity,
            message,
        })
    };

    match rule {
        Rule::FinalNewline => {
            if !text.is_empty() && !text.ends_with('\n') {
                let line = text.lines().count();
                let column = text.lines().last().map_or(1, |l| l.chars().count() + 1);
                push(line, column, "Files must end with a new line".into());
            }
        }
        Rule::NoEmptyRulesets => {
            let Ok(re) = Regex::new(r"\{\s*\}") else { return };
            for m in re.find_iter(text) {
                if text[..m.start()].ends_with('#') {
                    continue;
                }
                let (line, column) = position(text, m.start());
                push(line, column, "No empty rulesets allowed".into());
            }
        }
        Rule::Indentation { size } => {
            let mut depth: usize = 0;
            for (idx, raw) in text.lines().enumerate() {
                let trimmed = raw.trim_start();
                if trimmed.is_empty() || is_comment(trimmed) {
                    depth = update_depth(depth, trimmed);
                    continue;
                }
                let leading = &raw[..raw.len() - trimmed.len()];
                let expected_depth = if trimmed.starts_with('}') {
                    depth.saturating_sub(1)
                } else {
                    depth
                };
                let expected = expected_depth * size;
                if leading.contains('\t') {
                    push(idx + 1, 1, "Mixed tabs and spaces".into());
                } else if leading.len() != expected {
                    push(
                        idx + 1,
                        leading.len() + 1,
                        format!("Expected indentation of {expected} spaces but found {}", leading.len()),
                    );
                }
                depth = update_depth(depth, trimmed);
            }
        }
        _ => {
            for (idx, line) in text.lines().enumerate() {
                let code = strip_line_comment(line);
                match rule {
                    Rule::NoImportant => {
                        if let Some(col) = code.find("!important") {
                            push(idx + 1, col + 1, "!important not allowed".into());
                        }
                    }
                    Rule::NoIds => {
                        if let Some(selector) = code.split('{').next().filter(|_| code.contains('{')) {
                            if let Some(col) = find_id_selector(selector) {
                                push(idx + 1, col + 1, "ID selectors not allowed".into());
                            }
                        }
                    }
                    Rule::NoTrailingWhitespace => {
                        if line.ends_with([' ', '\t']) {
                            push(
                                idx + 1,
                                line.trim_end().chars().count() + 1,
                                "Whitespace detected at end of line".into(),
                            );
                        }
                    }
                    Rule::MaxLineLength { length } => {
                        let count = line.chars().count();
                        if count > length {
                            push(
                                idx + 1,
                                length + 1,
                                format!("line {} exceeds the maximum line length of {length}", idx + 1),
                            );
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

fn update_depth(depth: usize, line: &str) -> usize {
    let code = strip_line_comment(line);
    let opens = code.matches('{').count();
    let closes = code.matches('}').count();
    (depth + opens).saturating_sub(closes)
}

fn strip_line_comment(line: &str) -> &str {
    match line.find("//") {
        // Keep `url(http://...)` intact.
        Some(i) if !line[..i].ends_with(':') => &line[..i],
        _ => line,
    }
}

/// Byte offset of an `#id` selector, ignoring `#{...}` interpolation.
fn find_id_selector(selector: &str) -> Option<usize> {
    let bytes = selector.as_bytes();
    bytes.iter().enumerate().find_map(|(i, b)| {
        let next = bytes.get(i + 1)?;
        (*b == b'#' && (next.is_ascii_alphabetic() || *next == b'_' || *next == b'-')).then_some(i)
    })
}

fn position(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

/// Stylish-style report for one file.
pub fn format_stylish(file: &str, violations: &[Violation]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{file}");
    for v in violations {
        let _ = writeln!(
            out,
            "  {:>4}:{:<4} {:<8} {}  {}",
            v.line, v.column, v.severity, v.message, v.rule
        );
    }
    out
}

/// Lints style sources; error-severity violations fail the task
/// recoverably.
pub struct LintTask {
    config: LintConfig,
    /// Files that last linted clean, keyed by path, valued by the hash of
    /// rules + content.
    clean: Mutex<HashMap<PathBuf, blake3::Hash>>,
}

impl LintTask {
    pub fn new(config: LintConfig) -> Self {
        Self {
            config,
            clean: Mutex::new(HashMap::new()),
        }
    }

    fn load_rules(&self, ctx: &TaskContext) -> Result<(RuleSet, String)> {
        let path = ctx.resolve(&self.config.config);
        let text = ctx
            .fs
            .read_to_string(&path)
            .with_context(|| format!("reading lint rules {:?}", path))?;
        let rules = RuleSet::from_yaml(&text).with_context(|| format!("in {:?}", path))?;
        Ok((rules, text))
    }

    fn lint(&self, ctx: &TaskContext) -> Result<Settlement> {
        let (rules, rules_text) = self.load_rules(ctx)?;
        if rules.is_empty() {
            warn!(config = %self.config.config, "no lint rules enabled");
        }

        let files = PatternSet::new(&self.config.src)?.expand(ctx.fs.as_ref(), &ctx.root)?;

        let mut errors = 0usize;
        let mut warnings = 0usize;
        let mut skipped = 0usize;
        let mut reports = Vec::new();

        for file in &files {
            let text = ctx.fs.read_to_string(&file.path)?;

            let mut hasher = blake3::Hasher::new();
            hasher.update(rules_text.as_bytes());
            hasher.update(text.as_bytes());
            let hash = hasher.finalize();

            let mut clean = self.clean.lock().map_err(|_| anyhow!("lint cache poisoned"))?;
            if clean.get(&file.path) == Some(&hash) {
                skipped += 1;
                continue;
            }

            let violations = rules.check(&text);
            if violations.is_empty() {
                clean.insert(file.path.clone(), hash);
                continue;
            }
            clean.remove(&file.path);
            drop(clean);

            let file_errors = violations.iter().filter(|v| v.severity == Severity::Error).count();
            errors += file_errors;
            warnings += violations.iter().filter(|v| v.severity == Severity::Warning).count();

            let report = format_stylish(&file.rel, &violations);
            info!("\n{report}");
            if file_errors > 0 {
                reports.push(report);
            }
        }

        debug!(files = files.len(), skipped, "lint cache");

        if errors + warnings > 0 {
            info!(
                "{} problems ({} errors, {} warnings)",
                errors + warnings,
                errors,
                warnings
            );
        }

        if errors > 0 {
            return Ok(Settlement::recovered(
                "sass-lint",
                format!(
                    "{}\n{errors} lint errors, {warnings} warnings",
                    reports.join("\n")
                ),
            ));
        }
        Ok(Settlement::Success)
    }
}

impl Task for LintTask {
    fn run<'a>(&'a self, ctx: &'a TaskContext) -> BoxFuture<'a, Settlement> {
        Box::pin(async move {
            match self.lint(ctx) {
                Ok(settlement) => settlement,
                Err(err) => Settlement::fatal("lint", err),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
options:
  formatter: stylish
rules:
  no-important: 2
  no-ids: 1
  no-trailing-whitespace: 1
  final-newline: 1
  max-line-length: [1, { length: 20 }]
  indentation: [2, { size: 2 }]
  no-empty-rulesets: 2
  property-sort-order: 1
  no-color-literals: 0
"#;

    fn rules() -> RuleSet {
        RuleSet::from_yaml(RULES).unwrap()
    }

    fn names(v: &[Violation]) -> Vec<&'static str> {
        v.iter().map(|v| v.rule).collect()
    }

    #[test]
    fn parses_severities_and_options() {
        let set = rules();
        assert!(set.rules.contains(&(Rule::MaxLineLength { length: 20 }, Severity::Warning)));
        assert!(set.rules.contains(&(Rule::NoImportant, Severity::Error)));
        assert_eq!(set.rules.len(), 7);
    }

    #[test]
    fn clean_file_has_no_violations() {
        let text = ".a {\n  color: red;\n}\n";
        assert!(rules().check(text).is_empty());
    }

    #[test]
    fn reports_each_rule() {
        let text = "#main {\n  color: red !important;\n   margin: 0; \n}\n.b {}";
        let found = names(&rules().check(text));
        for rule in [
            "no-ids",
            "no-important",
            "indentation",
            "no-trailing-whitespace",
            "max-line-length",
            "no-empty-rulesets",
            "final-newline",
        ] {
            assert!(found.contains(&rule), "missing {rule} in {found:?}");
        }
    }

    #[test]
    fn hex_colors_and_interpolation_are_not_ids() {
        let text = ".a-#{$x} {\n  color: #fff;\n}\n";
        assert!(!names(&rules().check(text)).contains(&"no-ids"));
    }

    #[test]
    fn bad_severity_is_rejected() {
        assert!(RuleSet::from_yaml("rules:\n  no-ids: 5\n").is_err());
    }

    #[test]
    fn stylish_lists_position_and_rule() {
        let v = rules().check(".a {\n  color: red !important;\n}\n");
        let report = format_stylish("scss/a.scss", &v);
        assert!(report.starts_with("scss/a.scss\n"));
        assert!(report.contains("2:14"));
        assert!(report.contains("no-important"));
    }
}
