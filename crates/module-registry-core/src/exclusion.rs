//! Exclusion rules for packaging
//!
//! Patterns follow ignore-file conventions: they are evaluated in order and the
//! last matching pattern decides, a leading `!` re-includes a path excluded by
//! an earlier pattern, a trailing `/` restricts a pattern to directories, and a
//! pattern containing a `/` is anchored to the snapshot root. A path is also
//! excluded when any of its ancestor directories is excluded, so nothing below
//! an excluded directory can be re-included.
//!
//! Matching is pure string work over a rule list and a `/`-separated relative
//! path. Reading the ignore file from disk is the caller's job.

use regex::Regex;

use crate::error::{RegistryError, Result};

/// Name of the in-tree ignore file read from the snapshot root
pub const IGNORE_FILE_NAME: &str = ".tfignore";

/// Patterns appended after user rules; they always win
pub const BUILTIN_PATTERNS: &[&str] = &[".git*", IGNORE_FILE_NAME];

/// One compiled ignore pattern
#[derive(Debug, Clone)]
pub struct ExclusionRule {
    pattern: String,
    negated: bool,
    directory_only: bool,
    matcher: Regex,
}

impl ExclusionRule {
    /// Parse one ignore-file line
    ///
    /// Returns `Ok(None)` for blank lines and comments.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        // `\#` and `\!` start a literal pattern
        let body = if body.starts_with("\\#") || body.starts_with("\\!") {
            &body[1..]
        } else {
            body
        };
        let (directory_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let anchored = body.contains('/');
        let body = body.strip_prefix('/').unwrap_or(body);
        if body.is_empty() {
            return Ok(None);
        }

        let glob = glob_to_regex(body);
        let source = if anchored {
            format!("^{}$", glob)
        } else {
            format!("^(?:.*/)?{}$", glob)
        };
        let matcher = Regex::new(&source)
            .map_err(|e| RegistryError::InvalidPattern(format!("{}: {}", trimmed, e)))?;

        Ok(Some(Self {
            pattern: trimmed.to_string(),
            negated,
            directory_only,
            matcher,
        }))
    }

    /// The pattern as written
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether a match re-includes the path
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether the pattern only applies to directories
    pub fn is_directory_only(&self) -> bool {
        self.directory_only
    }

    /// Whether this pattern matches the path itself (ancestors not considered)
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        if self.directory_only && !is_dir {
            return false;
        }
        self.matcher.is_match(path)
    }
}

/// Ordered rules: user patterns first, then the built-ins
#[derive(Debug, Clone, Default)]
pub struct ExclusionRuleSet {
    rules: Vec<ExclusionRule>,
    rejected: Vec<String>,
}

impl ExclusionRuleSet {
    /// Parse ignore-file contents into user rules only
    ///
    /// Lines that cannot be compiled are skipped and reported through
    /// [`ExclusionRuleSet::rejected_patterns`].
    pub fn parse(contents: &str) -> Self {
        let mut set = Self::default();
        for line in contents.lines() {
            set.push_line(line);
        }
        set
    }

    /// Rule set for a snapshot: the ignore file's rules (if any) followed by
    /// the built-ins
    pub fn for_snapshot(ignore_file: Option<&str>) -> Self {
        Self::parse(ignore_file.unwrap_or_default()).with_builtins()
    }

    /// Append the built-in patterns
    pub fn with_builtins(mut self) -> Self {
        for pattern in BUILTIN_PATTERNS {
            self.push_line(pattern);
        }
        self
    }

    fn push_line(&mut self, line: &str) {
        match ExclusionRule::parse(line) {
            Ok(Some(rule)) => self.rules.push(rule),
            Ok(None) => {}
            Err(_) => self.rejected.push(line.to_string()),
        }
    }

    /// Classify a relative path
    pub fn is_excluded(&self, path: &str, is_dir: bool) -> bool {
        is_excluded(&self.rules, path, is_dir)
    }

    /// The compiled rules in evaluation order
    pub fn rules(&self) -> &[ExclusionRule] {
        &self.rules
    }

    /// Lines that failed to compile
    pub fn rejected_patterns(&self) -> &[String] {
        &self.rejected
    }
}

/// Decide whether `path` is excluded by `rules`
///
/// `path` is relative to the snapshot root and `/`-separated. Every ancestor
/// directory is checked first; an excluded ancestor excludes the path
/// regardless of later negations.
pub fn is_excluded(rules: &[ExclusionRule], path: &str, is_dir: bool) -> bool {
    let path = path.trim_matches('/');
    if path.is_empty() {
        return false;
    }
    for (idx, _) in path.match_indices('/') {
        if last_match_excludes(rules, &path[..idx], true) {
            return true;
        }
    }
    last_match_excludes(rules, path, is_dir)
}

fn last_match_excludes(rules: &[ExclusionRule], path: &str, is_dir: bool) -> bool {
    rules
        .iter()
        .filter(|rule| rule.matches(path, is_dir))
        .last()
        .map(|rule| !rule.negated)
        .unwrap_or(false)
}

/// Translate a glob body to a regex fragment
///
/// `*` and `?` never cross a `/`. `**` as a whole segment spans any number of
/// directories; anywhere else it behaves like `*`.
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let segment_start = i == 0 || chars[i - 1] == '/';
                match chars.get(i + 2) {
                    Some('/') if segment_start => {
                        out.push_str("(?:.*/)?");
                        i += 3;
                    }
                    None if segment_start => {
                        out.push_str(".*");
                        i += 2;
                    }
                    _ => {
                        out.push_str("[^/]*");
                        i += 2;
                    }
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                if let Some(len) = class_len(&chars[i..]) {
                    out.push_str(&translate_class(&chars[i + 1..i + len - 1]));
                    i += len;
                    continue;
                }
                out.push_str(r"\[");
            }
            '\\' if i + 1 < chars.len() => {
                i += 1;
                out.push_str(&regex::escape(&chars[i].to_string()));
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out
}

/// Length of a bracket expression starting at `chars[0] == '['`, including
/// both brackets
fn class_len(chars: &[char]) -> Option<usize> {
    let mut j = 1;
    if matches!(chars.get(j), Some('!') | Some('^')) {
        j += 1;
    }
    // A `]` right after the opening bracket is literal
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    chars[j..]
        .iter()
        .position(|&c| c == ']')
        .map(|pos| j + pos + 1)
}

fn translate_class(inner: &[char]) -> String {
    let (negated, body) = match inner.first() {
        Some('!') | Some('^') => (true, &inner[1..]),
        _ => (false, inner),
    };
    let mut out = String::from(if negated { "[^/" } else { "[" });
    for &c in body {
        if c != '-' && c.is_ascii_punctuation() {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(']');
    out
}
